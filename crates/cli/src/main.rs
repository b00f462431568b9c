use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use necker_core::{
    BlameStatistics, CanonicalType, Config, LabelFilter, ObjectIdentity, SelectorPair, SelectorPolicy, TargetSelection,
    TargetSetBuilder, TypeResolver,
};
use necker_kubehub::{KubeCatalog, KubeNamespaces, KubeSource, DEFAULT_QUEUE_CAP};
use necker_store::{export, BlameAttributor, StartFailure, WatcherManager};
use serde::Serialize;
use tokio::signal;
use tracing::{debug, info, warn};

mod render;

#[derive(Parser, Debug)]
#[command(name = "necker", version, about = "Count and attribute Kubernetes object mutations")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespace for namespaced types (default: the kubeconfig's namespace)
    #[arg(short = 'n', long = "namespace", global = true)]
    namespace: Option<String>,

    /// Watch namespaced types across every namespace
    #[arg(short = 'A', long = "all-namespaces", global = true, action = ArgAction::SetTrue, conflicts_with = "namespace")]
    all_namespaces: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count add/update/delete events per namespace and object
    Watch {
        /// Types to watch, e.g. "pods", "deploy.apps", "hpa.v1.autoscaling"
        types: Vec<String>,
        /// Watch every preferred-version type except known-noisy ones
        #[arg(short = 'a', long = "all-resources", action = ArgAction::SetTrue)]
        all_resources: bool,
        /// With --all-resources, also watch cluster-scoped types
        #[arg(long = "include-cluster-scoped", action = ArgAction::SetTrue)]
        include_cluster_scoped: bool,
        /// Object label selector, e.g. "app=web,tier!=db"
        #[arg(short = 'l', long = "selector")]
        selector: Option<String>,
        /// Namespace label selector
        #[arg(long = "namespace-selector")]
        namespace_selector: Option<String>,
        /// Seconds to watch before printing; Ctrl-C ends early
        #[arg(long = "duration", default_value_t = 60)]
        duration: u64,
    },
    /// Attribute updates of one object to its field managers
    Blame {
        /// Type of the object, e.g. "configmap"
        #[arg(value_name = "TYPE")]
        kind: String,
        /// Object name
        name: String,
        #[arg(long = "duration", default_value_t = 60)]
        duration: u64,
    },
    /// Export counters for the types in a config file until Ctrl-C
    Metrics {
        /// YAML config (TargetResources / AllResources / selectors)
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
        /// Prometheus listener, host:port
        #[arg(long = "metrics-addr", env = "NECKER_METRICS_ADDR")]
        metrics_addr: Option<String>,
        /// Seconds between publications
        #[arg(long = "interval", default_value_t = 15)]
        interval: u64,
    },
    /// Print the canonical type for each specifier
    Resolve {
        #[arg(required = true)]
        specifiers: Vec<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("NECKER_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics(addr: Option<&str>) -> bool {
    let Some(addr) = addr else { return false };
    let Ok(sock) = addr.parse::<std::net::SocketAddr>() else {
        warn!(addr = %addr, "invalid metrics address; expected host:port");
        return false;
    };
    match metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(sock).install() {
        Ok(()) => {
            info!(addr = %addr, "Prometheus metrics exporter listening");
            export::describe();
            true
        }
        Err(e) => {
            warn!(error = %e, "failed to install metrics exporter");
            false
        }
    }
}

fn queue_cap() -> usize {
    std::env::var("NECKER_QUEUE_CAP").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(DEFAULT_QUEUE_CAP)
}

fn filter(raw: Option<&str>) -> Result<LabelFilter> {
    match raw {
        Some(s) => LabelFilter::parse(s).with_context(|| format!("parsing selector {s:?}")),
        None => Ok(LabelFilter::everything()),
    }
}

/// Sleep for `secs`, or less if Ctrl-C arrives first.
async fn wait_for(secs: u64) {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => debug!(secs, "duration elapsed"),
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Ctrl-C received; finishing"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        },
    }
}

/// `None` watches every namespace.
fn namespace_scope(explicit: Option<String>, all_namespaces: bool, default_ns: &str) -> Option<String> {
    if all_namespaces {
        None
    } else {
        Some(explicit.unwrap_or_else(|| default_ns.to_string()))
    }
}

/// Some targets failing is tolerated; all of them failing is fatal.
fn ensure_started(failures: &[StartFailure], total: usize) -> Result<()> {
    if total > 0 && failures.len() == total {
        bail!("no watcher could be started ({} failures)", failures.len());
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { types, all_resources, include_cluster_scoped, selector, namespace_selector, duration } => {
            info!(types = ?types, all_resources, ns = ?cli.namespace, all_namespaces = cli.all_namespaces, duration, "watch invoked");
            init_metrics(std::env::var("NECKER_METRICS_ADDR").ok().as_deref());
            let client = necker_kubehub::client().await?;
            let namespace = namespace_scope(cli.namespace.clone(), cli.all_namespaces, client.default_namespace());
            let catalog = KubeCatalog::discover(client.clone()).await.context("discovering API resources")?;
            let explicit = TypeResolver::new(&catalog).resolve_all(types.as_slice())?;
            let selection = TargetSelection::from_parts(explicit, all_resources, include_cluster_scoped)?;
            let targets = TargetSetBuilder::new(&catalog).build(&selection)?;
            let pair = SelectorPair::new(filter(namespace_selector.as_deref())?, filter(selector.as_deref())?);

            let manager = WatcherManager::new(&targets, &SelectorPolicy::new(pair), Arc::new(KubeNamespaces::start(client.clone())));
            let source = KubeSource::new(client).namespace(namespace).capacity(queue_cap());
            ensure_started(&manager.start(&source).await, targets.len())?;
            wait_for(duration).await;
            manager.stop().await;

            let stats = manager.statistics().await;
            match cli.output {
                Output::Human => print!("{}", render::statistics_table(&stats)),
                Output::Json => print_json(&stats)?,
            }
        }
        Commands::Blame { kind, name, duration } => {
            info!(kind = %kind, name = %name, ns = ?cli.namespace, duration, "blame invoked");
            let client = necker_kubehub::client().await?;
            let catalog = KubeCatalog::discover(client.clone()).await.context("discovering API resources")?;
            let target = TypeResolver::new(&catalog).resolve(&kind)?;
            let namespaced = catalog
                .entries()
                .iter()
                .find(|e| e.canonical().ok().as_ref() == Some(&target))
                .map_or(true, |e| e.namespaced);
            if namespaced && cli.all_namespaces {
                bail!("{target} is namespaced; blame needs a single namespace, not -A");
            }
            let object_ns = if namespaced {
                namespace_scope(cli.namespace.clone(), false, client.default_namespace())
            } else {
                None
            };
            let object = ObjectIdentity::new(object_ns.as_deref(), name);

            let blame = BlameAttributor::new(target.clone(), object.clone());
            let source = KubeSource::new(client).namespace(object_ns).capacity(queue_cap());
            blame.start(&source).await.with_context(|| format!("watching {target}"))?;
            wait_for(duration).await;
            blame.stop().await;

            let stats = blame.statistics().await;
            match cli.output {
                Output::Human => print!("{}", render::blame_table(&target, &object, &stats)),
                Output::Json => {
                    #[derive(Serialize)]
                    struct Blame<'a> {
                        gvk: &'a CanonicalType,
                        object: &'a ObjectIdentity,
                        #[serde(flatten)]
                        stats: &'a BlameStatistics,
                    }
                    print_json(&Blame { gvk: &target, object: &object, stats: &stats })?;
                }
            }
        }
        Commands::Metrics { config, metrics_addr, interval } => {
            let raw = std::fs::read_to_string(&config).with_context(|| format!("reading {}", config.display()))?;
            let cfg = Config::from_yaml(&raw).with_context(|| format!("parsing {}", config.display()))?;
            if !init_metrics(metrics_addr.as_deref()) {
                bail!("metrics needs a valid --metrics-addr or NECKER_METRICS_ADDR");
            }
            let client = necker_kubehub::client().await?;
            let namespace = namespace_scope(cli.namespace.clone(), cli.all_namespaces, client.default_namespace());
            let catalog = KubeCatalog::discover(client.clone()).await.context("discovering API resources")?;
            let targets = TargetSetBuilder::new(&catalog).build(&cfg.selection()?)?;
            let policy = cfg.selector_policy()?;
            info!(targets = targets.len(), interval, "metrics exporter configured");

            let manager = WatcherManager::new(&targets, &policy, Arc::new(KubeNamespaces::start(client.clone())));
            let source = KubeSource::new(client).namespace(namespace).capacity(queue_cap());
            ensure_started(&manager.start(&source).await, targets.len())?;

            let mut tick = tokio::time::interval(Duration::from_secs(interval.max(1)));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let n = manager.publish().await;
                        debug!(samples = n, "published");
                    }
                    _ = signal::ctrl_c() => {
                        info!("Ctrl-C received; shutting down exporter");
                        break;
                    }
                }
            }
            manager.stop().await;
            manager.publish().await;
        }
        Commands::Resolve { specifiers } => {
            let client = necker_kubehub::client().await?;
            let catalog = KubeCatalog::discover(client).await.context("discovering API resources")?;
            let resolver = TypeResolver::new(&catalog);
            #[derive(Serialize)]
            struct Row<'a> {
                specifier: &'a str,
                #[serde(skip_serializing_if = "Option::is_none")]
                resolved: Option<CanonicalType>,
                #[serde(skip_serializing_if = "Option::is_none")]
                error: Option<String>,
            }
            let rows: Vec<Row<'_>> = specifiers
                .iter()
                .map(|s| match resolver.resolve(s) {
                    Ok(t) => Row { specifier: s, resolved: Some(t), error: None },
                    Err(e) => Row { specifier: s, resolved: None, error: Some(e.to_string()) },
                })
                .collect();
            match cli.output {
                Output::Human => {
                    for r in &rows {
                        match (&r.resolved, &r.error) {
                            (Some(t), _) => println!("{:<24} {}", r.specifier, t),
                            (None, Some(e)) => println!("{:<24} error: {}", r.specifier, e),
                            (None, None) => {}
                        }
                    }
                }
                Output::Json => print_json(&rows)?,
            }
            let failed = rows.iter().filter(|r| r.error.is_some()).count();
            if failed > 0 {
                bail!("{failed} specifier(s) could not be resolved");
            }
        }
    }

    Ok(())
}
