use clap::{ArgAction, Parser};
use geolinks::candidate::LocationCandidate;
use geolinks::config::Settings;
use geolinks::geo::Coordinate;
use geolinks::providers::{Enrichers, MapImage, OsmStaticMap, StaticMapRenderer};
use geolinks::resolve::{find_links, MessageResolutionService, ResolveOptions, ResultCollection};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// geolinks: find coordinates in map links and text
///
/// Reads a message (argument or stdin), follows short links, recognizes
/// every location in it, and prints them deduplicated, primary first.
///
/// Examples:
///   geolinks "Meet here: https://www.openstreetmap.org/?mlat=50.0874&mlon=14.4207"
///   geolinks --single "geo:50.087451,14.420671"
///   echo "50.087451, 14.420671" | geolinks --enrich
///   geolinks --lat 50.087451 --lon 14.420671 --share
///   geolinks --serve --port 3000
#[derive(Parser)]
#[command(name = "geolinks", version, about, long_about = None)]
struct Cli {
    /// Message text. Use `-` (or omit) to read stdin.
    #[arg(index = 1)]
    text: Option<String>,

    /// Treat the input as one value (a link, an EXIF tag, a typed pair).
    #[arg(long)]
    single: bool,

    /// Latitude (-90 to 90) of a manual point.
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude (-180 to 180) of a manual point.
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Drop locations closer than this many meters to the primary.
    #[arg(long, value_name = "METERS")]
    filter: Option<f64>,

    /// Look up address, timezone and elevation.
    #[arg(long)]
    enrich: bool,

    /// Print share and navigation links of every service for the primary.
    #[arg(long)]
    share: bool,

    /// Never touch the network: no redirects, offline enrichment only.
    #[arg(long)]
    offline: bool,

    /// JSON output on stdout.
    #[arg(long)]
    json: bool,

    /// Config file (defaults to ~/.geolinks/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Concurrent resolution units.
    #[arg(long)]
    workers: Option<usize>,

    /// Per-message deadline in milliseconds.
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// More logging on stderr (-v info, -vv debug). RUST_LOG wins.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Run the JSON HTTP API instead.
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 3000)]
    port: u16,
}

#[derive(Serialize)]
struct ShareLine {
    resolver: &'static str,
    kind: &'static str,
    value: String,
}

#[derive(Serialize)]
struct Output<'a> {
    results: &'a ResultCollection,
    #[serde(skip_serializing_if = "Option::is_none")]
    map: Option<MapImage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    share: Vec<ShareLine>,
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Settings {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => Settings::load(),
    };
    if cli.offline {
        settings.offline = true;
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers.max(1);
    }
    if let Some(ms) = cli.deadline_ms {
        settings.deadline_ms = ms;
    }
    if cli.filter.is_some() {
        settings.proximity_threshold_m = cli.filter;
    }
    settings
}

fn read_text(cli: &Cli) -> String {
    match cli.text.as_deref() {
        Some(text) if text != "-" => text.to_string(),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
                eprintln!("Error: Cannot read stdin: {}", e);
                std::process::exit(1);
            });
            buf
        }
    }
}

async fn resolve(cli: &Cli, service: &MessageResolutionService, opts: &ResolveOptions) -> ResultCollection {
    // 1. Manual pair
    if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        let coord = Coordinate::new(lat, lon).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });
        let mut results = ResultCollection::new();
        results.add(LocationCandidate::new("manual", coord, format!("{},{}", lat, lon)).with_prefix("Manual"));
        return results;
    }

    let text = read_text(cli);
    if text.trim().is_empty() {
        eprintln!("Error: No input. Pass a message, pipe one on stdin, or use --lat/--lon.");
        std::process::exit(1);
    }

    // 2. One value
    if cli.single {
        return service.resolve_single_with(&text, opts).await;
    }

    // 3. Whole message
    service.resolve_message_with(&text, &find_links(&text), opts).await
}

fn share_lines(service: &MessageResolutionService, coord: &Coordinate) -> Vec<ShareLine> {
    let mut lines = Vec::new();
    for r in service.registry().all() {
        let ops = [
            ("share_link", r.share_link(coord)),
            ("drive_link", r.drive_link(coord)),
            ("share_text", r.share_text(coord)),
        ];
        for (kind, value) in ops {
            if let Ok(value) = value {
                lines.push(ShareLine { resolver: r.id(), kind, value });
            }
        }
    }
    lines
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let settings = load_settings(&cli);

    // ── Server mode ─────────────────────────────────────────────

    if cli.serve {
        let state = geolinks::server::AppState::from_settings(settings);
        if let Err(e) = geolinks::server::start(&cli.host, cli.port, state).await {
            eprintln!("Error: Server failed on {}:{}: {}", cli.host, cli.port, e);
            std::process::exit(1);
        }
        return;
    }

    // ── Resolve ─────────────────────────────────────────────────

    if let Some(f) = cli.filter {
        if !f.is_finite() || f < 0.0 {
            eprintln!("Error: --filter must be a non-negative number of meters");
            std::process::exit(1);
        }
    }

    let enrichers = Enrichers::from_settings(&settings);
    let maps = OsmStaticMap::new(&settings);
    let opts = ResolveOptions::from_settings(&settings);
    let service = geolinks::build_service(settings);

    let mut results = resolve(&cli, &service, &opts).await;

    if cli.enrich {
        results = tokio::task::spawn_blocking(move || {
            for candidate in results.locations() {
                candidate.enrich(&enrichers);
            }
            results
        })
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error: Enrichment failed: {}", e);
            std::process::exit(1);
        });
    }

    let points: Vec<Coordinate> = results.locations().map(|c| *c.coordinate()).collect();
    let map = if points.is_empty() { None } else { maps.render(&points).ok() };
    let share = match (cli.share, results.primary()) {
        (true, Some(primary)) => share_lines(&service, primary.coordinate()),
        _ => Vec::new(),
    };

    // ── Output ──────────────────────────────────────────────────

    if cli.json {
        let output = Output { results: &results, map, share };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: Cannot serialize results: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        for candidate in results.locations() {
            println!("{}", candidate.render());
        }
        for error in results.errors() {
            println!("\u{26A0}\u{FE0F}  {}", error);
        }
        if let Some(map) = &map {
            println!("\u{1F5FA}  {}", map.url);
        }
        for line in &share {
            println!("  {:<8} {:<10} {}", line.resolver, line.kind, line.value);
        }
    }

    if results.primary().is_none() {
        if !cli.json && results.errors().next().is_none() {
            eprintln!("No location found.");
        }
        std::process::exit(2);
    }
}
