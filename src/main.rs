mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use pk_av::{FfprobeProber, Prober, ToolRegistry};
use pk_core::config::Config;
use pk_server::AppContext;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise use defaults based on the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "periploko=trace,pk_server=debug,pk_av=debug,pk_core=debug,tower_http=debug"
                .to_string()
        } else {
            "periploko=info,pk_server=info,pk_av=info,pk_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Scan { json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan_library(cli.config.as_deref(), json))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, cli.config.as_deref(), json))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("periploko {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting periploko server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    pk_server::start(config).await?;
    Ok(())
}

async fn scan_library(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let ctx = AppContext::from_config(config)?;
    let catalog = ctx.assembler().build().await;

    if json {
        let out = serde_json::json!({
            "data": catalog.movies,
            "count": catalog.movies.len(),
            "scan_errors": catalog.errors,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} movie(s)\n", catalog.movies.len());
    for movie in &catalog.movies {
        let year = movie.year.map(|y| format!(" ({y})")).unwrap_or_default();
        println!("{}  {}{}", movie.id, movie.title, year);
        println!("    path: {} [root {}]", movie.path, movie.root);
        println!(
            "    {} | {} | {} | {}",
            movie.size_formatted,
            movie.duration_formatted.as_deref().unwrap_or("Unknown"),
            movie.resolution.as_deref().unwrap_or("?"),
            movie.codec.as_deref().unwrap_or("?"),
        );
        if let Some(ref sub) = movie.subtitle {
            println!("    subtitle: {sub}");
        }
        if movie.requires_transcode {
            println!("    requires transcode");
        }
    }

    if !catalog.errors.is_empty() {
        println!("\nScan errors: {}", catalog.errors.len());
        for err in &catalog.errors {
            println!("  {}: {}", err.path, err.error);
        }
    }

    Ok(())
}

async fn probe_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools
        .require("ffprobe")
        .context("ffprobe is required to probe files")?;
    let prober = FfprobeProber::new(ffprobe.to_path_buf()).with_timeout(config.probe.timeout());

    let report = prober.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Container: {}", report.container.as_deref().unwrap_or("unknown"));
    if let Some(size) = report.size {
        println!("Size: {}", pk_core::format_size(size));
    }
    println!(
        "Duration: {}",
        report
            .duration
            .map(pk_core::format_duration)
            .unwrap_or_else(|| "Unknown".into())
    );
    if let Some(bit_rate) = report.bit_rate {
        println!("Bitrate: {} kb/s", bit_rate / 1000);
    }

    match report.video {
        Some(ref v) => {
            print!(
                "\nVideo: {} {}x{}",
                v.codec.as_deref().unwrap_or("?"),
                v.width.unwrap_or(0),
                v.height.unwrap_or(0)
            );
            if let Some(fps) = v.frame_rate {
                print!(", {:.3} fps", fps);
            }
            println!();
        }
        None => println!("\nVideo: none"),
    }

    match report.audio {
        Some(ref a) => {
            print!("Audio: {}", a.codec.as_deref().unwrap_or("?"));
            if let Some(ch) = a.channels {
                print!(" {ch}ch");
            }
            if let Some(rate) = a.sample_rate {
                print!(" {rate} Hz");
            }
            println!();
        }
        None => println!("Audio: none"),
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Probing, transcoding and thumbnails need ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p).with_context(|| format!("invalid config {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Media roots: {}", config.library.roots.len());
    for root in &config.library.roots {
        println!("    {}", root.display());
    }
    println!(
        "  Enrichment: {}",
        if config.metadata.enabled && config.metadata.tmdb_api_key.is_some() {
            "tmdb"
        } else {
            "disabled"
        }
    );
    println!("  Default quality: {}", config.transcode.default_quality);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}
