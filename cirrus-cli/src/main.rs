use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::debug;
use serde_json::{Map, Value, json};

use cirrus_core::composite_id::{CompositeId, Separator, TypedCompositeId, split};
use cirrus_core::resource_id::{
    HierarchicalId, IdFormat, RESERVED_CHARACTER, RESOURCE_GROUP, TypedResourceId,
};
use cirrus_provider_azurerm::storagepool::{
    DiskPoolId, DiskPoolManagedDiskAttachmentId, ManagedDiskId,
};

#[derive(Parser)]
#[command(name = "cirrus")]
#[command(about = "Inspect Azure Resource Manager resource IDs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a resource ID and print its segments as JSON
    Parse {
        /// Resource ID to parse
        id: String,

        /// Kind of ID (detected from the known kinds when omitted)
        #[arg(long, value_enum)]
        kind: Option<IdKind>,
    },
    /// Join two resource IDs into a composite ID
    Compose {
        /// Primary resource ID
        primary: String,

        /// Secondary resource ID
        secondary: String,

        /// Separator token; must contain '|'
        #[arg(long, default_value = "/managedDisks|")]
        separator: String,
    },
    /// Split a composite ID into its two resource IDs
    Split {
        /// Composite ID to split
        composite: String,

        /// Kind of composite ID
        #[arg(long, value_enum, default_value = "disk-pool-managed-disk-attachment")]
        kind: CompositeKind,
    },
}

/// Hierarchical ID kinds known to the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IdKind {
    ResourceGroup,
    DiskPool,
    ManagedDisk,
}

impl IdKind {
    const ALL: [IdKind; 3] = [IdKind::ResourceGroup, IdKind::DiskPool, IdKind::ManagedDisk];

    fn format(self) -> IdFormat {
        match self {
            IdKind::ResourceGroup => RESOURCE_GROUP,
            IdKind::DiskPool => DiskPoolId::FORMAT,
            IdKind::ManagedDisk => ManagedDiskId::FORMAT,
        }
    }
}

/// Composite ID kinds known to the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CompositeKind {
    DiskPoolManagedDiskAttachment,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Parse { id, kind } => run_parse(&id, kind),
        Commands::Compose {
            primary,
            secondary,
            separator,
        } => run_compose(&primary, &secondary, &separator),
        Commands::Split { composite, kind } => run_split(&composite, kind),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run_parse(input: &str, kind: Option<IdKind>) -> Result<String, String> {
    let id = match kind {
        Some(kind) => HierarchicalId::parse(input, &kind.format()).map_err(|e| e.to_string())?,
        None => detect(input)?,
    };
    serde_json::to_string_pretty(&describe(&id)).map_err(|e| e.to_string())
}

fn run_compose(primary: &str, secondary: &str, separator: &str) -> Result<String, String> {
    if !separator.contains(RESERVED_CHARACTER) {
        return Err(format!(
            "separator {:?} must contain {:?}",
            separator, RESERVED_CHARACTER
        ));
    }
    let primary = detect(primary).map_err(|e| format!("primary ID: {}", e))?;
    let secondary = detect(secondary).map_err(|e| format!("secondary ID: {}", e))?;

    // The process exits right after printing, so the separator can live until then
    let separator = Separator::new(Box::leak(separator.to_string().into_boxed_str()));
    Ok(CompositeId::compose(primary, secondary, separator).to_string())
}

fn run_split(input: &str, kind: CompositeKind) -> Result<String, String> {
    match kind {
        CompositeKind::DiskPoolManagedDiskAttachment => {
            let (primary, secondary) =
                split(input, DiskPoolManagedDiskAttachmentId::SEPARATOR).map_err(|e| e.to_string())?;
            let id = DiskPoolManagedDiskAttachmentId::parse(input).map_err(|e| e.to_string())?;
            debug!("{} splits into {} and {}", id, primary, secondary);

            let output = json!({
                "primary": describe(id.disk_pool_id.as_hierarchical()),
                "secondary": describe(id.managed_disk_id.as_hierarchical()),
            });
            serde_json::to_string_pretty(&output).map_err(|e| e.to_string())
        }
    }
}

/// Parse `input` as the first known kind that accepts it
fn detect(input: &str) -> Result<HierarchicalId, String> {
    let mut errors = Vec::new();
    for kind in IdKind::ALL {
        match HierarchicalId::parse(input, &kind.format()) {
            Ok(id) => {
                debug!("{} parsed as {:?}", input, kind);
                return Ok(id);
            }
            Err(e) => errors.push(format!("  {}: {}", kind.format().name, e)),
        }
    }
    Err(format!(
        "{} is not a known resource ID:\n{}",
        input,
        errors.join("\n")
    ))
}

fn describe(id: &HierarchicalId) -> Value {
    let mut segments = Map::new();
    for (field, value) in id.fields() {
        segments.insert(field.to_string(), Value::String(value.to_string()));
    }
    json!({
        "kind": id.format().name,
        "id": id.to_string(),
        "subscriptionId": id.subscription_id(),
        "resourceGroupName": id.resource_group_name(),
        "segments": segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: &str = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.StoragePool/diskPools/p1";
    const DISK: &str = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/disks/d1";

    #[test]
    fn test_parse_with_kind() {
        let output = run_parse(POOL, Some(IdKind::DiskPool)).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["kind"], "Disk Pool");
        assert_eq!(value["resourceGroupName"], "rg1");
        assert_eq!(value["segments"]["diskPoolName"], "p1");
        assert_eq!(value["id"], POOL);
    }

    #[test]
    fn test_parse_detects_kind() {
        let output = run_parse(DISK, None).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["kind"], "Managed Disk");

        let output = run_parse("/subscriptions/s1/resourceGroups/rg1", None).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["kind"], "Resource Group");
    }

    #[test]
    fn test_parse_wrong_kind() {
        let error = run_parse(DISK, Some(IdKind::DiskPool)).unwrap_err();
        assert!(error.contains("Microsoft.StoragePool"));

        let error = run_parse("/subscriptions/s1/resourceGroups/rg1/foo", None).unwrap_err();
        assert!(error.contains("is not a known resource ID"));
    }

    #[test]
    fn test_compose_and_split() {
        let composite = run_compose(POOL, DISK, "/managedDisks|").unwrap();
        assert_eq!(composite, format!("{}/managedDisks|{}", POOL, DISK));

        let output = run_split(&composite, CompositeKind::DiskPoolManagedDiskAttachment).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["primary"]["id"], POOL);
        assert_eq!(value["secondary"]["id"], DISK);
    }

    #[test]
    fn test_compose_requires_reserved_character() {
        let error = run_compose(POOL, DISK, "/managedDisks/").unwrap_err();
        assert!(error.contains("must contain"));
    }

    #[test]
    fn test_split_without_separator() {
        let error = run_split(POOL, CompositeKind::DiskPoolManagedDiskAttachment).unwrap_err();
        assert!(error.contains("does not contain the separator"));
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["cirrus", "parse", POOL, "--kind", "disk-pool"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Parse {
                kind: Some(IdKind::DiskPool),
                ..
            }
        ));

        let cli = Cli::try_parse_from(["cirrus", "-vv", "split", "x"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Split {
                kind: CompositeKind::DiskPoolManagedDiskAttachment,
                ..
            }
        ));

        assert!(Cli::try_parse_from(["cirrus", "parse", POOL, "--kind", "vm"]).is_err());
    }
}
