use std::path::PathBuf;

use clap::Parser;

pub use crate::tiling::batch_table::HierarchyLayout;

/// How placemark assets are paired with attribute instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MatchBy {
    /// Placemark name equals instance id.
    #[default]
    #[value(name = "name")]
    Name,
    /// Placemark `i` is instance `i`.
    #[value(name = "position")]
    Position,
}

impl std::fmt::Display for MatchBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchBy::Name => write!(f, "name"),
            MatchBy::Position => write!(f, "position"),
        }
    }
}

/// Knobs of the tile assembly core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Numeric batch-table columns go to the binary body.
    pub batch_table_binary: bool,
    pub hierarchy_layout: HierarchyLayout,
    /// Recenter merged positions and write the centroid as `RTC_CENTER`.
    ///
    /// Without it positions stay absolute ECEF in f32, which at earth radius
    /// resolves only about 0.5 m.
    pub center: bool,
}

/// tileset.json parameters.
#[derive(Debug, Clone)]
pub struct TilesetConfig {
    pub geometric_error: f64,
    /// Metres added above the highest placemark.
    pub height_extent: f64,
    /// Degrees added around the placemark extent.
    pub region_margin: f64,
    pub pretty: bool,
}

impl Default for TilesetConfig {
    fn default() -> Self {
        Self {
            geometric_error: 100.0,
            height_extent: 100.0,
            region_margin: 0.01,
            pretty: true,
        }
    }
}

/// Fully resolved pipeline configuration (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub attributes: Option<PathBuf>,
    pub output: PathBuf,
    pub match_by: MatchBy,
    /// Class of instances synthesized when no attribute document is given.
    pub class_name: String,
    /// Assets are glTF Y-up and need the basis change on placement.
    pub y_up: bool,
    pub assembly: AssemblyOptions,
    pub tileset: TilesetConfig,
    pub dry_run: bool,
    pub verbose: bool,
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            attributes: None,
            output: PathBuf::new(),
            match_by: MatchBy::default(),
            class_name: "Building".into(),
            y_up: true,
            assembly: AssemblyOptions::default(),
            tileset: TilesetConfig::default(),
            dry_run: false,
            verbose: false,
            threads: None,
        }
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "tile-assembler",
    about = "Assemble placed glTF assets and their attributes into one b3dm tile",
    version
)]
pub struct CliArgs {
    /// Placemark document (KML config.xml)
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Attribute document (JSON) with instances, classes and parents
    #[arg(short = 'a', long)]
    pub attributes: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Store numeric batch table columns in the binary body
    #[arg(long)]
    pub batch_table_binary: bool,

    /// Write the hierarchy as a top-level HIERARCHY key instead of the extension
    #[arg(long)]
    pub legacy: bool,

    /// Recenter positions and write RTC_CENTER. Without it positions are
    /// stored as f32 ECEF and resolve only about 0.5 m
    #[arg(long)]
    pub center: bool,

    /// Pair assets with instances by placemark name or by position
    #[arg(long, value_enum, default_value = "name")]
    pub match_by: MatchBy,

    /// Class name for instances synthesized from placemarks
    #[arg(long, default_value = "Building")]
    pub class_name: String,

    /// Root geometric error of the tileset
    #[arg(long, default_value_t = 100.0)]
    pub geometric_error: f64,

    /// Height in metres added above the highest placemark
    #[arg(long, default_value_t = 100.0)]
    pub height_extent: f64,

    /// Margin in degrees around the placemark extent
    #[arg(long, default_value_t = 0.01)]
    pub region_margin: f64,

    /// Write tileset.json without indentation
    #[arg(long)]
    pub compact_json: bool,

    /// Assets are already Z-up
    #[arg(long)]
    pub z_up: bool,

    /// Load inputs and report stats only
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for PipelineConfig {
    fn from(args: CliArgs) -> Self {
        PipelineConfig {
            input: args.input,
            attributes: args.attributes,
            output: args.output,
            match_by: args.match_by,
            class_name: args.class_name,
            y_up: !args.z_up,
            assembly: AssemblyOptions {
                batch_table_binary: args.batch_table_binary,
                hierarchy_layout: if args.legacy {
                    HierarchyLayout::Legacy
                } else {
                    HierarchyLayout::Extension
                },
                center: args.center,
            },
            tileset: TilesetConfig {
                geometric_error: args.geometric_error,
                height_extent: args.height_extent,
                region_margin: args.region_margin,
                pretty: !args.compact_json,
            },
            dry_run: args.dry_run,
            verbose: args.verbose,
            threads: args.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tileset_config() {
        let tc = TilesetConfig::default();
        assert_eq!(tc.geometric_error, 100.0);
        assert_eq!(tc.height_extent, 100.0);
        assert_eq!(tc.region_margin, 0.01);
        assert!(tc.pretty);
    }

    #[test]
    fn default_assembly_options() {
        let opts = AssemblyOptions::default();
        assert!(!opts.batch_table_binary);
        assert!(!opts.center);
        assert_eq!(opts.hierarchy_layout, HierarchyLayout::Extension);
    }

    #[test]
    fn match_by_display() {
        assert_eq!(MatchBy::Name.to_string(), "name");
        assert_eq!(MatchBy::Position.to_string(), "position");
    }

    #[test]
    fn cli_args_to_pipeline_config() {
        let args = CliArgs::parse_from([
            "tile-assembler",
            "-i",
            "data/config.xml",
            "-a",
            "data/attributes.json",
            "-o",
            "./out",
            "--batch-table-binary",
            "--legacy",
            "--center",
            "--match-by",
            "position",
            "--class-name",
            "House",
            "--geometric-error",
            "50",
            "--height-extent",
            "30",
            "--region-margin",
            "0.001",
            "--compact-json",
            "--z-up",
            "--dry-run",
            "-v",
            "-j",
            "8",
        ]);

        let config: PipelineConfig = args.into();

        assert_eq!(config.input, PathBuf::from("data/config.xml"));
        assert_eq!(config.attributes, Some(PathBuf::from("data/attributes.json")));
        assert_eq!(config.output, PathBuf::from("./out"));
        assert_eq!(config.match_by, MatchBy::Position);
        assert_eq!(config.class_name, "House");
        assert!(!config.y_up);
        assert!(config.assembly.batch_table_binary);
        assert!(config.assembly.center);
        assert_eq!(config.assembly.hierarchy_layout, HierarchyLayout::Legacy);
        assert!((config.tileset.geometric_error - 50.0).abs() < f64::EPSILON);
        assert!((config.tileset.height_extent - 30.0).abs() < f64::EPSILON);
        assert!((config.tileset.region_margin - 0.001).abs() < f64::EPSILON);
        assert!(!config.tileset.pretty);
        assert!(config.dry_run);
        assert!(config.verbose);
        assert_eq!(config.threads, Some(8));
    }

    #[test]
    fn center_help_states_precision() {
        use clap::CommandFactory;

        let command = CliArgs::command();
        let center = command
            .get_arguments()
            .find(|a| a.get_id() == "center")
            .unwrap();
        let help = center.get_long_help().or(center.get_help()).unwrap().to_string();
        assert!(help.contains("RTC_CENTER"));
        assert!(help.contains("f32 ECEF"));
        assert!(help.contains("0.5 m"));
    }

    #[test]
    fn cli_args_minimal() {
        let args = CliArgs::parse_from(["tile-assembler", "-i", "config.xml", "-o", "output"]);
        let config: PipelineConfig = args.into();

        assert_eq!(config.input, PathBuf::from("config.xml"));
        assert_eq!(config.output, PathBuf::from("output"));
        assert!(config.attributes.is_none());
        assert_eq!(config.match_by, MatchBy::Name);
        assert_eq!(config.class_name, "Building");
        assert!(config.y_up);
        assert_eq!(config.assembly, AssemblyOptions::default());
        assert!(config.tileset.pretty);
        assert!(!config.dry_run);
        assert!(!config.verbose);
        assert_eq!(config.threads, None);
    }
}
