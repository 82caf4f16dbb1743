use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use clusterstack::CLUSTERSTACK_VERSION;
use clusterstack::aws::{AssetStore, ClusterBucket, DirectoryAssetStore, StagedAsset, StaticCatalog};
use clusterstack::common::clock::SystemClock;
use clusterstack::common::setup::setup_logging;
use clusterstack::model::load_cluster_model;
use clusterstack::templates::ClusterStackBuilder;
use clusterstack::templates::emitter::ROOT_TEMPLATE_NAME;

#[derive(Parser)]
#[command(
    author,
    about,
    version(CLUSTERSTACK_VERSION),
    disable_help_subcommand(true),
    help_expected(true)
)]
struct RootOptions {
    /// Enables debug logging
    #[arg(long, global = true, help_heading("GLOBAL OPTIONS"))]
    verbose: bool,

    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// Generates the documents of a cluster stack
    Build(BuildOpts),
}

#[derive(Parser)]
struct BuildOpts {
    /// Cluster configuration (YAML)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    config: PathBuf,

    /// Instance type, subnet and image metadata (JSON)
    #[arg(long, env = "CLUSTERSTACK_CATALOG", value_hint = clap::ValueHint::FilePath)]
    catalog: PathBuf,

    /// Bucket the cluster artifacts are staged in
    #[arg(long, env = "CLUSTERSTACK_BUCKET")]
    bucket: String,

    /// Region of the bucket and of the cluster
    #[arg(long, env = "AWS_DEFAULT_REGION")]
    region: String,

    /// Directory of the cluster artifacts in the bucket
    #[arg(long)]
    artifact_dir: String,

    /// Name of the cluster stack
    #[arg(long)]
    stack_name: String,

    /// Directory the generated documents are written to
    #[arg(long, env = "CLUSTERSTACK_OUTPUT_DIR", value_hint = clap::ValueHint::DirPath)]
    output_dir: PathBuf,
}

fn command_build(opts: BuildOpts) -> anyhow::Result<()> {
    let cluster = load_cluster_model(&opts.config)
        .with_context(|| format!("Cannot load cluster configuration {}", opts.config.display()))?;
    let catalog = StaticCatalog::load(&opts.catalog)
        .with_context(|| format!("Cannot load catalog {}", opts.catalog.display()))?;
    let bucket = ClusterBucket::new(opts.bucket, opts.region, opts.artifact_dir);

    let emitted = ClusterStackBuilder::new(&catalog, &SystemClock)
        .build_cluster_template(&cluster, &bucket, &opts.stack_name)
        .with_context(|| format!("Cannot build cluster {}", opts.stack_name))?;

    let mut assets = vec![StagedAsset {
        content: emitted.root_content.clone(),
        name: ROOT_TEMPLATE_NAME.to_string(),
    }];
    assets.extend(emitted.staged_assets());
    let mut store = DirectoryAssetStore::new(&opts.output_dir)?;
    for locator in store.store(&assets)? {
        println!("{locator}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let opts = RootOptions::parse();
    setup_logging(opts.verbose);

    match opts.subcmd {
        SubCommand::Build(opts) => command_build(opts),
    }
}
