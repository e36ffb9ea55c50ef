//! Subcommand arguments and handlers

use std::error::Error;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use magmap_core::{
    export_ascii_grid, export_grid, export_image, locations_from_columns, render_survey,
    sample_profile, samples_from_table, samples_to_table, CoordinateSystem, DipoleForwardModel,
    DisplayConfig, DistanceMask, ExportConfig, ExportFormat, FieldComponent, ForwardModel,
    GridFilter, GridPipeline, GriddedSurvey, GriddingConfig, InducingField,
    InterpolationMethod, LineSegment, MagmapConfig, MagneticParameters, MagnetizationKind,
    Prism, Profile, ProfileOptions, ProfileSource, ScatterSample,
};
use magmap_io::{read_survey, write_survey, PpmWorldFileWriter, RasterWriter, SurveyColumns};

type CommandResult = Result<(), Box<dyn Error>>;

/// Survey file and its column layout
#[derive(Args, Debug)]
pub struct SurveyArgs {
    /// Survey CSV (or .tsv) with a header row
    pub input: PathBuf,

    /// Easting column
    #[arg(long)]
    pub x_col: Option<String>,

    /// Northing column
    #[arg(long)]
    pub y_col: Option<String>,

    /// Value column
    #[arg(long)]
    pub value_col: Option<String>,
}

impl SurveyArgs {
    fn columns(&self) -> SurveyColumns {
        let mut columns = SurveyColumns::for_path(&self.input);
        if let Some(x) = &self.x_col {
            columns.x = x.clone();
        }
        if let Some(y) = &self.y_col {
            columns.y = y.clone();
        }
        if let Some(value) = &self.value_col {
            columns.value = value.clone();
        }
        columns
    }

    fn load(&self) -> Result<Vec<ScatterSample>, Box<dyn Error>> {
        let table = read_survey(&self.input, &self.columns())?;
        tracing::info!("Read {} observations from {}", table.len(), self.input.display());
        Ok(samples_from_table(&table)?)
    }

    fn stem(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "survey".to_string())
    }
}

/// Gridding overrides on top of the configuration file
#[derive(Args, Debug)]
pub struct GriddingArgs {
    /// nearest, linear, cubic or minimumCurvature
    #[arg(long)]
    pub method: Option<InterpolationMethod>,

    /// Cell size in map units
    #[arg(long)]
    pub cell_size: Option<f64>,

    /// Blank cells farther than this from any observation
    #[arg(long, conflicts_with = "no_mask")]
    pub dist_max: Option<f64>,

    /// Keep every cell
    #[arg(long)]
    pub no_mask: bool,
}

impl GriddingArgs {
    fn apply(&self, mut gridding: GriddingConfig) -> Result<GriddingConfig, Box<dyn Error>> {
        if let Some(method) = self.method {
            gridding.method = method;
        }
        if let Some(cell_size) = self.cell_size {
            gridding = gridding.with_cell_size(cell_size);
        }
        if self.no_mask {
            gridding.mask = None;
        } else if let Some(dist_max) = self.dist_max {
            gridding.mask = Some(DistanceMask::new(dist_max)?);
        }
        gridding.validate()?;
        Ok(gridding)
    }
}

/// Display overrides on top of the configuration file
#[derive(Args, Debug)]
pub struct DisplayArgs {
    /// Colormap name, `_r` suffix reverses
    #[arg(long)]
    pub colormap: Option<String>,

    /// Color limits
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub limits: Option<Vec<f64>>,

    /// Show a derived grid: dx, dy, dz, thg, tilt, upward_continuation, rtp
    #[arg(long)]
    pub filter: Option<GridFilter>,

    /// Continuation height for upward_continuation
    #[arg(long, default_value_t = 0.0)]
    pub height: f64,

    /// Field inclination and declination for rtp
    #[arg(long, num_args = 2, value_names = ["INC", "DEC"], allow_negative_numbers = true)]
    pub pole_field: Option<Vec<f64>>,

    /// Opacity of the colored layer
    #[arg(long)]
    pub alpha: Option<f32>,

    /// Linear colors instead of histogram equalization
    #[arg(long)]
    pub no_equalize: bool,

    /// Flat colors without sun shading
    #[arg(long)]
    pub no_hillshade: bool,

    /// Draw this many contour levels between the color limits
    #[arg(long)]
    pub contours: Option<usize>,
}

impl DisplayArgs {
    fn apply(&self, mut display: DisplayConfig) -> Result<DisplayConfig, Box<dyn Error>> {
        if let Some(colormap) = &self.colormap {
            display.colormap = colormap.clone();
        }
        if let Some([vmin, vmax]) = self.limits.as_deref() {
            display.limits = Some([*vmin, *vmax]);
        }
        if let Some(filter) = self.filter {
            display.filter = Some(match filter {
                GridFilter::UpwardContinuation { .. } => {
                    GridFilter::UpwardContinuation { height: self.height }
                }
                GridFilter::ReductionToPole { .. } => match self.pole_field.as_deref() {
                    Some([inclination, declination]) => GridFilter::ReductionToPole {
                        inclination: *inclination,
                        declination: *declination,
                    },
                    _ => filter,
                },
                other => other,
            });
        }
        if let Some(alpha) = self.alpha {
            display.alpha = alpha;
        }
        if self.no_equalize {
            display.equalizer.enabled = false;
        }
        if self.no_hillshade {
            display.hillshade = None;
        }
        if let Some(n) = self.contours {
            display.contours = Some(n);
        }
        display.validate()?;
        Ok(display)
    }
}

#[derive(Args, Debug)]
pub struct GridArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    #[command(flatten)]
    pub gridding: GriddingArgs,

    /// Output path; defaults to `<output_dir>/<input stem>.<ext>`
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print a JSON summary of the gridding run
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    #[command(flatten)]
    pub gridding: GriddingArgs,

    #[command(flatten)]
    pub display: DisplayArgs,

    /// Output image path; defaults to `<output_dir>/<input stem>.ppm`
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Distance axis of a profile
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ProfileAxis {
    /// Distance from the start point
    #[default]
    Local,
    /// Distance offset by the start easting
    X,
    /// Distance offset by the start northing
    Y,
}

impl From<ProfileAxis> for CoordinateSystem {
    fn from(axis: ProfileAxis) -> Self {
        match axis {
            ProfileAxis::Local => CoordinateSystem::Local,
            ProfileAxis::X => CoordinateSystem::XProfile,
            ProfileAxis::Y => CoordinateSystem::YProfile,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    /// Start point A
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true, requires = "to")]
    pub from: Option<Vec<f64>>,

    /// End point A'
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    pub to: Option<Vec<f64>>,

    /// Line centre, used with --bearing and --length instead of --from/--to
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true, conflicts_with = "from")]
    pub center: Option<Vec<f64>>,

    /// Compass bearing of the line in degrees
    #[arg(long, default_value_t = 90.0, allow_negative_numbers = true)]
    pub bearing: f64,

    /// Frame length around the centre
    #[arg(long, default_value_t = 1000.0)]
    pub length: f64,

    /// Number of positions along the line
    #[arg(long, default_value_t = 200)]
    pub points: usize,

    /// Distance axis
    #[arg(long, value_enum, default_value_t = ProfileAxis::Local)]
    pub axis: ProfileAxis,

    /// Also sample the gridded survey
    #[arg(long)]
    pub with_grid: bool,

    #[command(flatten)]
    pub gridding: GriddingArgs,

    /// Output CSV; stdout when omitted
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl ProfileArgs {
    fn segment(&self) -> Result<LineSegment, Box<dyn Error>> {
        match (self.from.as_deref(), self.to.as_deref(), self.center.as_deref()) {
            (Some(&[ax, ay]), Some(&[bx, by]), _) => {
                Ok(LineSegment::new([ax, ay], [bx, by], self.points)?)
            }
            (_, _, Some(&[cx, cy])) => Ok(LineSegment::from_bearing(
                [cx, cy],
                self.bearing,
                self.length,
                self.points,
            )?),
            _ => Err("profile needs --from and --to, or --center".into()),
        }
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Prism centre easting and northing
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true, default_values_t = [0.0, 0.0])]
    pub center: Vec<f64>,

    /// Elevation of the prism top
    #[arg(long, default_value_t = -20.0, allow_negative_numbers = true)]
    pub top: f64,

    /// Prism width, length and height
    #[arg(long, num_args = 3, value_names = ["DX", "DY", "DZ"], default_values_t = [10.0, 10.0, 10.0])]
    pub size: Vec<f64>,

    /// Volume susceptibility (SI)
    #[arg(long, default_value_t = 0.1)]
    pub susceptibility: f64,

    /// induced, remanent or total
    #[arg(long, default_value = "induced")]
    pub magnetization: MagnetizationKind,

    /// Koenigsberger ratio
    #[arg(long, default_value_t = 0.0)]
    pub q_ratio: f64,

    /// Remanence inclination and declination
    #[arg(long, num_args = 2, value_names = ["INC", "DEC"], allow_negative_numbers = true, default_values_t = [0.0, 0.0])]
    pub remanence: Vec<f64>,

    /// Inducing field intensity (nT), inclination and declination
    #[arg(long, num_args = 3, value_names = ["NT", "INC", "DEC"], allow_negative_numbers = true, default_values_t = [54_500.0, 90.0, 0.0])]
    pub field: Vec<f64>,

    /// Survey area as min x, max x, min y, max y
    #[arg(long, num_args = 4, value_names = ["MINX", "MAXX", "MINY", "MAXY"], allow_negative_numbers = true, default_values_t = [-100.0, 100.0, -100.0, 100.0])]
    pub area: Vec<f64>,

    /// Station spacing
    #[arg(long, default_value_t = 10.0)]
    pub spacing: f64,

    /// Observation elevation
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub altitude: f64,

    /// tf, bx, by or bz
    #[arg(long, default_value = "tf")]
    pub component: FieldComponent,

    /// Output CSV; stdout when omitted
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl SimulateArgs {
    fn prism(&self) -> Prism {
        Prism {
            dx: self.size[0],
            dy: self.size[1],
            dz: self.size[2],
            x0: self.center[0],
            y0: self.center[1],
            z0: self.top,
            ..Default::default()
        }
    }

    fn parameters(&self) -> MagneticParameters {
        MagneticParameters {
            susceptibility: self.susceptibility,
            kind: self.magnetization,
            q_ratio: self.q_ratio,
            remanence_inclination: self.remanence[0],
            remanence_declination: self.remanence[1],
            field: InducingField {
                intensity: self.field[0],
                inclination: self.field[1],
                declination: self.field[2],
            },
        }
    }

    /// Stations on a regular layout covering the area
    fn stations(&self) -> Result<Vec<[f64; 3]>, Box<dyn Error>> {
        if !(self.spacing > 0.0) {
            return Err(format!("spacing must be positive, got {}", self.spacing).into());
        }
        let (min_x, max_x, min_y, max_y) = (self.area[0], self.area[1], self.area[2], self.area[3]);
        if self.area.iter().any(|v| !v.is_finite()) {
            return Err(format!("area bounds must be finite, got {:?}", self.area).into());
        }
        if min_x > max_x || min_y > max_y {
            return Err("area minimum exceeds maximum".into());
        }
        let axis = |lo: f64, hi: f64| -> Vec<f64> {
            let n = ((hi - lo) / self.spacing + 1e-9).floor() as usize + 1;
            (0..n).map(|i| lo + i as f64 * self.spacing).collect()
        };
        let xs = axis(min_x, max_x);
        let ys = axis(min_y, max_y);

        let (mut x, mut y) = (Vec::new(), Vec::new());
        for &yj in &ys {
            for &xi in &xs {
                x.push(xi);
                y.push(yj);
            }
        }
        let z = vec![self.altitude; x.len()];
        Ok(locations_from_columns(&x, &y, &z)?)
    }
}

fn default_output(export: &ExportConfig, stem: &str, extension: &str) -> PathBuf {
    export.output_dir.join(stem).with_extension(extension)
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn report(written: &[PathBuf]) {
    for path in written {
        println!("{}", path.display());
    }
}

fn grid_loaded(
    survey: &SurveyArgs,
    gridding: &GriddingArgs,
    config: &MagmapConfig,
) -> Result<GriddedSurvey, Box<dyn Error>> {
    let samples = survey.load()?;
    let gridding = gridding.apply(config.gridding)?;
    Ok(GridPipeline::new().grid_survey(&samples, &gridding)?)
}

/// `magmap grid`
pub fn grid(args: &GridArgs, config: MagmapConfig) -> CommandResult {
    let gridded = grid_loaded(&args.survey, &args.gridding, &config)?;
    let export = &config.export;
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| export.output_path(&args.survey.stem()));
    ensure_parent(&path)?;

    let written = match export.format {
        ExportFormat::GeoTiff => export_grid(&gridded.grid, export.epsg, &path)?,
        ExportFormat::AsciiGrid => export_ascii_grid(&gridded.grid, export.epsg, &path)?,
        ExportFormat::PpmImage => {
            let image = render_survey(&gridded.grid, &config.display)?;
            export_image(&image, export.epsg, &path)?
        }
    };
    report(&written);

    if args.summary {
        println!("{}", serde_json::to_string_pretty(&gridded.summary())?);
    }
    Ok(())
}

/// `magmap render`
pub fn render(args: &RenderArgs, config: MagmapConfig) -> CommandResult {
    let gridded = grid_loaded(&args.survey, &args.gridding, &config)?;
    let display = args.display.apply(config.display.clone())?;
    let image = GridPipeline::new().render_survey(&gridded.grid, &display)?;

    let path = args.output.clone().unwrap_or_else(|| {
        default_output(&config.export, &args.survey.stem(), PpmWorldFileWriter.extension())
    });
    ensure_parent(&path)?;
    report(&export_image(&image, config.export.epsg, &path)?);
    Ok(())
}

/// `magmap profile`
pub fn profile(args: &ProfileArgs, config: MagmapConfig) -> CommandResult {
    let segment = args.segment()?;
    let samples = args.survey.load()?;
    let options = ProfileOptions {
        coordinate_system: args.axis.into(),
        ..Default::default()
    };

    let profile = if args.with_grid {
        let gridding = args.gridding.apply(config.gridding)?;
        let gridded = GridPipeline::new().grid_survey(&samples, &gridding)?;
        sample_profile(
            &segment,
            &[
                ProfileSource::Scattered(&samples),
                ProfileSource::Gridded(&gridded.grid),
            ],
            &options,
        )?
    } else {
        sample_profile(&segment, &[ProfileSource::Scattered(&samples)], &options)?
    };

    match &args.output {
        Some(path) => {
            ensure_parent(path)?;
            write_profile(File::create(path)?, &profile)?;
            report(std::slice::from_ref(path));
        }
        None => write_profile(io::stdout().lock(), &profile)?,
    }
    Ok(())
}

/// CSV with `distance,x,y` and one value column per series
fn write_profile<W: Write>(writer: W, profile: &Profile) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(writer);
    let Some(first) = profile.series.first() else {
        writer.flush()?;
        return Ok(());
    };

    let mut header = vec!["distance".to_string(), "x".to_string(), "y".to_string()];
    header.extend((0..profile.series.len()).map(|k| match k {
        0 => "scattered".to_string(),
        1 => "gridded".to_string(),
        k => format!("series_{}", k),
    }));
    writer.write_record(&header)?;

    for i in 0..first.len() {
        let mut row = vec![
            first.distance[i].to_string(),
            first.x[i].to_string(),
            first.y[i].to_string(),
        ];
        row.extend(profile.series.iter().map(|s| s.values[i].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// `magmap simulate`
pub fn simulate(args: &SimulateArgs) -> CommandResult {
    let stations = args.stations()?;
    let result = DipoleForwardModel.fields(
        &args.prism(),
        &args.parameters(),
        &stations,
        &[args.component],
    )?;
    let table = samples_to_table(&result.to_samples(args.component)?);
    tracing::info!(
        "Simulated {} at {} stations",
        args.component,
        table.len()
    );

    match &args.output {
        Some(path) => {
            ensure_parent(path)?;
            write_survey(File::create(path)?, &table)?;
            report(std::slice::from_ref(path));
        }
        None => write_survey(io::stdout().lock(), &table)?,
    }
    Ok(())
}
