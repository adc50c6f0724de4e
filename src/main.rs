//! CavernSeer CLI - inspect and maintain scan and project stores.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cavernseer::archive::RecordFile;
use cavernseer::config::StoreConfig;
use cavernseer::facade::{ProjectStore, ScanStore};
use cavernseer::record::{CachedRecord, FullRecord, Project, Scan, StoredRecord, VERSION_KEY};
use cavernseer::store::{ContentStore, ProjectKind, ScanKind, StoreKind};
use cavernseer::util::{clock, Error, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Which store a command addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Scans,
    Projects,
}

impl Target {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "scans" | "scan" | "s" => Some(Self::Scans),
            "projects" | "project" | "p" => Some(Self::Projects),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("cavernseer");

    // Parse global flags
    let mut level: Option<&str> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut rest: Vec<&str> = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => level = Some("debug"),
            "-vv" | "--trace" => level = Some("trace"),
            "-q" | "--quiet" => level = Some("error"),
            "-c" | "--config" => match iter.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("--config needs a file");
                    return ExitCode::FAILURE;
                }
            },
            _ => rest.push(arg),
        }
    }
    init_logging(level);

    if rest.is_empty() {
        print_usage(prog);
        return ExitCode::SUCCESS;
    }

    let config = match &config_path {
        Some(path) => match StoreConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => StoreConfig::default_path()
            .map(StoreConfig::load_or_default)
            .unwrap_or_default(),
    };
    debug!(data = %config.data_root.display(), cache = %config.cache_root.display(), "config");

    let result = match (rest[0], &rest[1..]) {
        ("list" | "ls", [target]) => with_target(target, |t| cmd_list(&config, t)),
        ("sync", []) => cmd_sync(&config),
        ("info" | "i", [file]) => cmd_info(Path::new(file)),
        ("import", [target, file]) => with_target(target, |t| cmd_import(&config, t, Path::new(file))),
        ("delete" | "rm", [target, id]) => with_target(target, |t| cmd_delete(&config, t, id)),
        ("upgrade", [target]) => with_target(target, |t| cmd_upgrade(&config, t, None)),
        ("upgrade", [target, id]) => with_target(target, |t| cmd_upgrade(&config, t, Some(*id))),
        ("clear-caches", []) => cmd_clear_caches(&config),
        ("config", []) => cmd_config(&config),
        ("version" | "--version", []) => {
            println!("cavernseer {} (built {})", env!("CARGO_PKG_VERSION"), env!("CAVERNSEER_BUILD_DATE"));
            Ok(())
        }
        ("help" | "h" | "-h" | "--help", _) => {
            print_usage(prog);
            Ok(())
        }
        (cmd, _) => {
            eprintln!("Unknown command or wrong arguments: {}", cmd);
            print_usage(prog);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins unless a verbosity flag was given; default `info`.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn with_target(name: &str, f: impl FnOnce(Target) -> Result<()>) -> Result<()> {
    let target = Target::parse(name)
        .ok_or_else(|| Error::other(format!("Unknown store '{}', expected scans or projects", name)))?;
    f(target)
}

fn print_usage(prog: &str) {
    println!("CavernSeer CLI - Inspect scan and project stores");
    println!();
    println!("Usage: {} [options] <command> [args]", prog);
    println!();
    println!("Commands:");
    println!("  list <scans|projects>             List cache entries (synchronizes first)");
    println!("  sync                              Synchronize both stores");
    println!("  info <file>                       Describe a record or cache file");
    println!("  import <scans|projects> <file>    Import a record file under its file name");
    println!("  delete <scans|projects> <id>      Delete a record and its cache entry");
    println!("  upgrade <scans|projects> [id]     Rewrite legacy records at the current version");
    println!("  clear-caches                      Remove all cache files");
    println!("  config                            Print the effective configuration");
    println!("  version                           Show version");
    println!();
    println!("Options:");
    println!("  -c, --config FILE  Config file (default: platform config dir)");
    println!("  -v, --verbose      Debug output");
    println!("  -vv, --trace       Trace output (very verbose)");
    println!("  -q, --quiet        Errors only");
}

fn cmd_list(config: &StoreConfig, target: Target) -> Result<()> {
    match target {
        Target::Scans => {
            let mut store = ScanStore::from_config(config)?;
            store.synchronize()?;
            print_entries(&*store, |e| e.preview.as_ref().map(|p| format!("preview {} B", p.len())));
        }
        Target::Projects => {
            let mut store = ProjectStore::from_config(config)?;
            store.synchronize()?;
            print_entries(&*store, |e| Some(format!("{} scans", e.scan_count)));
        }
    }
    Ok(())
}

fn print_entries<K: StoreKind>(store: &ContentStore<K>, extra: impl Fn(&K::Cache) -> Option<String>) {
    println!("{} ({})", K::DIRECTORY_NAME, store.layout().data_dir().display());
    if store.entries().is_empty() {
        println!("  (empty)");
        return;
    }
    for entry in store.entries() {
        match entry.error() {
            Some(err) => println!("  {:<32} {}", entry.identifier(), err),
            None => println!(
                "  {:<32} {:<32} {}  {}",
                entry.identifier(),
                entry.display_name(),
                clock::format_timestamp(entry.timestamp()),
                extra(entry).unwrap_or_default()
            ),
        }
    }
}

fn cmd_sync(config: &StoreConfig) -> Result<()> {
    let mut scans = ScanStore::from_config(config)?;
    let mut projects = ProjectStore::from_config(config)?;
    // scans on a worker while projects sync here
    scans.synchronize_in_background(None);
    let project_report = projects.synchronize()?;
    let scan_report = scans
        .wait_for_sync()
        .unwrap_or_else(|| Err(Error::other("scan synchronization did not start")))?;

    for (name, report) in [("scans", scan_report), ("projects", project_report)] {
        println!(
            "{:<9} {} entries ({} loaded, {} failed)",
            name, report.total, report.inserted, report.failed
        );
    }
    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let file = RecordFile::open(path)?;
    println!("File: {}", path.display());
    println!("Size: {} bytes{}", file.bytes().len(), if file.is_mapped() { " (mapped)" } else { "" });

    let rec = file.decode()?;
    let version = rec.opt_int(VERSION_KEY)?.unwrap_or(1);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

    if ext == ScanKind::FILE_EXTENSION {
        let scan = Scan::from_record(&rec)?;
        println!("Kind: {} (schema {} of {})", Scan::KIND, version, Scan::CURRENT_VERSION);
        println!("Name: {}", scan.name);
        println!("Created: {}", clock::format_timestamp(scan.timestamp));
        println!("Slices: {} ({} vertices, {} faces)", scan.slices.len(), scan.vertex_count(), scan.face_count());
        println!("Center: {:?}  Extent: {:?}", scan.center, scan.extent);
        println!("Stations: {}  Lines: {}", scan.stations.len(), scan.lines.len());
        if let Some(loc) = &scan.location {
            println!("Location: {:.6}, {:.6} @ {:.1} m", loc.latitude, loc.longitude, loc.altitude);
        }
    } else if ext == ProjectKind::FILE_EXTENSION {
        let project = Project::from_record(&rec)?;
        println!("Kind: {} (schema {} of {})", Project::KIND, version, Project::CURRENT_VERSION);
        println!("Name: {}", project.display_name());
        println!("Created: {}", clock::format_timestamp(project.timestamp));
        for (i, relation) in project.relations().iter().enumerate() {
            match relation.neighbor {
                Some(n) => println!("  [{}] {} -> [{}]", i, relation.scan.name, n),
                None => println!("  [{}] {}", i, relation.scan.name),
            }
        }
    } else {
        println!("Fields (schema {}):", version);
        for (key, value) in rec.iter() {
            println!("  {:<20} {}", key, value.tag().name());
        }
    }
    Ok(())
}

fn cmd_import(config: &StoreConfig, target: Target, file: &Path) -> Result<()> {
    let path = match target {
        Target::Scans => ScanStore::from_config(config)?.import_file(file)?,
        Target::Projects => ProjectStore::from_config(config)?.import_file(file)?,
    };
    println!("Imported {}", path.display());
    Ok(())
}

fn cmd_delete(config: &StoreConfig, target: Target, id: &str) -> Result<()> {
    match target {
        Target::Scans => ScanStore::from_config(config)?.delete(id)?,
        Target::Projects => ProjectStore::from_config(config)?.delete(id)?,
    }
    println!("Deleted {}", id);
    Ok(())
}

fn cmd_upgrade(config: &StoreConfig, target: Target, id: Option<&str>) -> Result<()> {
    let count = match (target, id) {
        (Target::Scans, Some(id)) => usize::from(ScanStore::from_config(config)?.upgrade(id)?),
        (Target::Scans, None) => ScanStore::from_config(config)?.upgrade_all()?,
        (Target::Projects, Some(id)) => usize::from(ProjectStore::from_config(config)?.upgrade(id)?),
        (Target::Projects, None) => ProjectStore::from_config(config)?.upgrade_all()?,
    };
    println!("Upgraded {} record(s)", count);
    Ok(())
}

fn cmd_clear_caches(config: &StoreConfig) -> Result<()> {
    ScanStore::from_config(config)?.clear_caches()?;
    ProjectStore::from_config(config)?.clear_caches()?;
    println!("Caches cleared under {}", config.cache_root.display());
    Ok(())
}

fn cmd_config(config: &StoreConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
