use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use astro_frames::collection::{CollectionOptions, ImageFileCollection, SaveOptions};
use astro_frames::data::filter::Predicate;
use astro_frames::data::model::FILE_COLUMN;
use astro_frames::group::ImageGroup;
use astro_frames::logging::LogConfig;
use astro_frames::patch::{
    add_keys, add_object_info, patch_headers, read_file_list, read_key_table, ObjectInfoOptions,
    PatchOptions,
};
use astro_frames::reduction::{build_masters, MasterOptions, TEMPERATURE_TOLERANCE};
use astro_frames::site::ObservatoryConfig;
use astro_frames::triage::{triage_directory, write_triage_outputs, DEFAULT_KEYWORDS};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress messages
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log debugging messages
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet_console: bool,

    /// Log nothing
    #[arg(long, global = true)]
    silent_console: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a CSV summary of header keywords for a directory
    Summary {
        dir: PathBuf,

        /// Keywords to include; `*` for every keyword
        #[arg(short, long, value_delimiter = ',', default_value = "*")]
        keywords: Vec<String>,

        /// Output file (default: summary.csv in the directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the files matching keyword criteria
    Filter {
        dir: PathBuf,

        /// Criteria like `imagetyp=light,filter=R,object=*,airmass=`
        criteria: Predicate,

        /// Print full paths instead of file names
        #[arg(long)]
        paths: bool,
    },

    /// Print the files grouped by the values of keywords
    Group {
        dir: PathBuf,

        /// Keywords to group by, outermost first
        #[arg(short, long, value_delimiter = ',', required = true)]
        keys: Vec<String>,

        /// Column listed at each leaf; must be unique per file
        #[arg(long, default_value = FILE_COLUMN)]
        index: String,
    },

    /// List frames missing a filter, object name or pointing
    Triage {
        dir: PathBuf,

        /// Keywords for the manifest
        #[arg(short, long, value_delimiter = ',')]
        keywords: Option<Vec<String>>,

        /// Report only, do not write list files or the manifest
        #[arg(long)]
        no_write: bool,
    },

    /// Add site, time, pointing and overscan keywords
    Patch {
        dir: PathBuf,

        #[command(flatten)]
        save: SaveArgs,

        /// Observatory description (JSON); the built-in one is used otherwise
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        no_purge: bool,

        #[arg(long)]
        no_time: bool,

        #[arg(long)]
        no_apparent_position: bool,

        #[arg(long)]
        no_overscan: bool,

        #[arg(long)]
        no_imagetype_fix: bool,
    },

    /// Set OBJECT on light frames from a list of known objects
    Objects {
        dir: PathBuf,

        #[command(flatten)]
        save: SaveArgs,

        /// CSV with object,ra,dec columns (default: obsinfo.txt in the directory)
        #[arg(long)]
        object_list: Option<PathBuf>,

        /// Match radius in degrees
        #[arg(long, default_value_t = 1.0)]
        match_radius: f64,
    },

    /// Set keywords from a table in each file of a list
    AddKeys {
        /// CSV with keyword,value columns; quote a value to keep it a string
        #[arg(long)]
        key_file: PathBuf,

        /// File list with a header line, one name per row
        #[arg(long)]
        file_list: PathBuf,

        #[command(flatten)]
        save: SaveArgs,
    },

    /// Combine bias and dark frames into masters
    Masters {
        dir: PathBuf,

        /// Directory for the masters (default: the image directory)
        #[arg(short, long)]
        destination: Option<PathBuf>,

        #[arg(long)]
        overwrite: bool,

        /// Allowed CCD-TEMP spread within a dark group, degrees C
        #[arg(long, default_value_t = TEMPERATURE_TOLERANCE)]
        temperature_tolerance: f64,
    },
}

/// Where modified files go.
#[derive(Args)]
struct SaveArgs {
    /// Suffix added to file names before the extension
    #[arg(long, default_value = "_new")]
    suffix: String,

    /// Write to this directory, keeping file names
    #[arg(long, conflicts_with = "suffix")]
    destination: Option<PathBuf>,

    /// Replace existing files
    #[arg(long)]
    overwrite: bool,

    /// Modify files in place
    #[arg(long, conflicts_with_all = ["suffix", "destination"])]
    in_place: bool,
}

impl SaveArgs {
    fn options(&self) -> SaveOptions {
        if self.in_place {
            SaveOptions::in_place()
        } else if let Some(dir) = &self.destination {
            SaveOptions::to_directory(dir).overwrite(self.overwrite)
        } else {
            SaveOptions::with_suffix(&self.suffix).overwrite(self.overwrite)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    LogConfig {
        verbose: cli.verbose,
        debug: cli.debug,
        quiet_console: cli.quiet_console,
        silent_console: cli.silent_console,
    }
    .init()
    .context("initialising logging")?;

    match cli.command {
        Commands::Summary {
            dir,
            keywords,
            output,
        } => summary(&dir, &keywords, output),
        Commands::Filter {
            dir,
            criteria,
            paths,
        } => filter(&dir, &criteria, paths),
        Commands::Group { dir, keys, index } => group(&dir, &keys, &index),
        Commands::Triage {
            dir,
            keywords,
            no_write,
        } => triage(&dir, keywords, no_write),
        Commands::Patch {
            dir,
            save,
            config,
            no_purge,
            no_time,
            no_apparent_position,
            no_overscan,
            no_imagetype_fix,
        } => {
            let options = PatchOptions {
                save: save.options(),
                purge_bad: !no_purge,
                add_time: !no_time,
                add_apparent_pos: !no_apparent_position,
                add_overscan: !no_overscan,
                fix_imagetype: !no_imagetype_fix,
                config: load_config(config.as_deref())?,
            };
            let count = patch_headers(&dir, &options)
                .with_context(|| format!("patching headers in {}", dir.display()))?;
            println!("Patched {count} files");
            Ok(())
        }
        Commands::Objects {
            dir,
            save,
            object_list,
            match_radius,
        } => {
            let options = ObjectInfoOptions {
                object_list,
                match_radius,
                save: save.options(),
            };
            let named = add_object_info(&dir, &options)
                .with_context(|| format!("adding object names in {}", dir.display()))?;
            println!("Named {named} frames");
            Ok(())
        }
        Commands::AddKeys {
            key_file,
            file_list,
            save,
        } => {
            let keys = read_key_table(&key_file)
                .with_context(|| format!("reading keys from {}", key_file.display()))?;
            let files = read_file_list(&file_list)
                .with_context(|| format!("reading file list {}", file_list.display()))?;
            let count = add_keys(&files, &keys, &save.options())?;
            println!("Added {} keywords to {count} files", keys.len());
            Ok(())
        }
        Commands::Masters {
            dir,
            destination,
            overwrite,
            temperature_tolerance,
        } => {
            let options = MasterOptions {
                destination,
                overwrite,
                temperature_tolerance,
            };
            let written = build_masters(&dir, &options)
                .with_context(|| format!("building masters from {}", dir.display()))?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ObservatoryConfig> {
    match path {
        Some(path) => ObservatoryConfig::from_json_file(path)
            .with_context(|| format!("reading observatory config {}", path.display())),
        None => Ok(ObservatoryConfig::default()),
    }
}

fn summary(dir: &Path, keywords: &[String], output: Option<PathBuf>) -> Result<()> {
    let collection = ImageFileCollection::new(CollectionOptions::at(dir).keywords(keywords))
        .with_context(|| format!("indexing {}", dir.display()))?;
    if collection.summary().is_none() {
        bail!("No readable FITS files in {}", dir.display());
    }
    let output = output.unwrap_or_else(|| dir.join("summary.csv"));
    collection
        .write_summary(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote summary of {} files to {}", collection.files().len(), output.display());
    Ok(())
}

fn filter(dir: &Path, criteria: &Predicate, full_paths: bool) -> Result<()> {
    let keywords: Vec<&str> = criteria.keywords().collect();
    let mut collection = ImageFileCollection::open(dir, &keywords)
        .with_context(|| format!("indexing {}", dir.display()))?;
    if full_paths {
        for path in collection.filtered_paths(criteria)? {
            println!("{}", path.display());
        }
    } else {
        for name in collection.files_filtered(criteria)? {
            println!("{name}");
        }
    }
    Ok(())
}

fn group(dir: &Path, keys: &[String], index: &str) -> Result<()> {
    let mut keywords = keys.to_vec();
    if index != FILE_COLUMN {
        keywords.push(index.to_string());
    }
    let collection = ImageFileCollection::open(dir, &keywords)
        .with_context(|| format!("indexing {}", dir.display()))?;
    let Some(table) = collection.summary() else {
        bail!("No readable FITS files in {}", dir.display());
    };
    let groups = ImageGroup::new(table, keys, index)?;
    print!("{}", groups.tree());
    Ok(())
}

fn triage(dir: &Path, keywords: Option<Vec<String>>, no_write: bool) -> Result<()> {
    let keywords =
        keywords.unwrap_or_else(|| DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect());
    let report = triage_directory(dir, &keywords)
        .with_context(|| format!("triaging {}", dir.display()))?;
    println!("Needs filter:      {}", report.needs_filter.len());
    println!("Needs object name: {}", report.needs_object_name.len());
    println!("Needs pointing:    {}", report.needs_pointing.len());
    if !no_write {
        write_triage_outputs(dir, &report)
            .with_context(|| format!("writing triage lists to {}", dir.display()))?;
    }
    Ok(())
}
