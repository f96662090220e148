use std::path::PathBuf;
use std::process::ExitCode;

use quire::{Config, Site, Timer};
use quire::error::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Builds a static site.
        cmd quill {
            /// Site root. Defaults to the current directory.
            optional -s, --source source: PathBuf
            /// Publish directory, overriding `publish_dir`.
            optional -d, --destination destination: PathBuf
            /// Configuration file. Defaults to `config.toml` or `config.json`
            /// in the site root.
            optional -c, --config config: PathBuf
            optional --base-url base_url: String
            optional --build-drafts
            optional --ugly-urls
            /// Render independent pages concurrently.
            optional --parallel
            optional -v, --verbose
            /// Show where every page would be published, then exit.
            optional --plan
        }
    }
}

fn config(flags: &flags::Quill) -> Result<Config> {
    let mut config = match (&flags.config, &flags.source) {
        (Some(path), Some(root)) => Config { root: root.clone(), ..Config::read(path)? },
        (Some(path), None) => Config::read(path)?,
        (None, root) => Config::discover(root.clone().unwrap_or_else(|| PathBuf::from(".")))?,
    };

    if let Some(destination) = &flags.destination {
        config.publish_dir = std::env::current_dir()?.join(destination);
    }

    if let Some(base_url) = &flags.base_url {
        config.base_url = base_url.clone();
    }

    config.build_drafts |= flags.build_drafts;
    config.ugly_urls |= flags.ugly_urls;
    config.parallel |= flags.parallel;
    config.verbose |= flags.verbose;
    Ok(config)
}

fn run(flags: flags::Quill) -> Result<()> {
    let config = config(&flags)?;
    let mut site = Site::new(config);
    if flags.plan {
        site.process()?;
        return site.show_plan(&mut std::io::stdout().lock());
    }

    let mut timer = Timer::new();
    site.build(&mut timer)?;
    println!("{}", site.stats());
    println!("{timer}");

    if site.config.verbose {
        let names: Vec<_> = site.possible_indexes().iter().map(|n| n.to_string()).collect();
        tracing::info!(names = %names.join(", "), "possible indexes");
    }

    Ok(())
}

fn main() -> ExitCode {
    let flags = flags::Quill::from_env_or_exit();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match flags.verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::new("info"),
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(flags) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
