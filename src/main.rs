use std::path::PathBuf;

use anyhow::Result;
use chrono::{Days, Utc};
use clap::{Parser, ValueEnum};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use concert_finder::{
    AppConfig, ConcertFinder, Event, SearchConfig, SearchOutcome, SearchRequest, SortOrder,
};

/// Command-line arguments for concert-finder
#[derive(Parser, Debug)]
#[command(name = "concert-finder")]
#[command(about = "Find upcoming concerts near you based on your music taste")]
#[command(version)]
struct Args {
    /// Zip code to search around
    #[arg(long)]
    zip: String,

    /// Search radius in miles (10-100)
    #[arg(long, default_value_t = 25)]
    radius: u32,

    /// Favorite artist; repeat for up to 10
    #[arg(long = "artist")]
    artists: Vec<String>,

    /// Favorite genre; repeat for up to 3
    #[arg(long = "genre")]
    genres: Vec<String>,

    /// How far ahead to look
    #[arg(long, value_enum, default_value_t = Window::OneMonth)]
    window: Window,

    /// Drop events at venues with arena-scale capacity
    #[arg(long)]
    exclude_large_venues: bool,

    /// Broaden the search with musically similar artists
    #[arg(long)]
    expand_similar: bool,

    /// Result ordering
    #[arg(long, value_enum, default_value_t = Sort::Date)]
    sort: Sort,

    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Path to a JSON config file holding API keys
    #[arg(long, env = "CONCERT_FINDER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Window {
    #[value(name = "2w")]
    TwoWeeks,
    #[value(name = "1m")]
    OneMonth,
    #[value(name = "3m")]
    ThreeMonths,
    #[value(name = "6m")]
    SixMonths,
}

impl Window {
    fn days(self) -> u64 {
        match self {
            Window::TwoWeeks => 14,
            Window::OneMonth => 30,
            Window::ThreeMonths => 90,
            Window::SixMonths => 180,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Sort {
    Date,
    Popularity,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concert_finder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?;
    let ticketmaster_key = config.require_ticketmaster_key()?.to_string();
    let lastfm_key = config.lastfm_api_key.clone();
    if lastfm_key.is_none() && (args.expand_similar || args.sort == Sort::Popularity) {
        warn!("no Last.fm key configured; searching listed artists only, ordered by date");
    }

    let today = Utc::now().date_naive();
    let request = SearchRequest {
        zip_code: args.zip.clone(),
        radius_miles: args.radius,
        artists: args.artists.clone(),
        genres: args.genres.clone(),
        date_from: today,
        date_to: today + Days::new(args.window.days()),
        exclude_large_venues: args.exclude_large_venues,
        expand_similar_artists: args.expand_similar && lastfm_key.is_some(),
        sort: match args.sort {
            Sort::Date => SortOrder::Date,
            Sort::Popularity if lastfm_key.is_some() => SortOrder::Popularity,
            Sort::Popularity => SortOrder::Date,
        },
    };

    let finder = ConcertFinder::new(ticketmaster_key, lastfm_key, SearchConfig::default())?;
    let outcome = finder.search(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.events)?);
    } else {
        print!("{}", render_outcome(&outcome, &request));
    }

    Ok(())
}

fn render_outcome(outcome: &SearchOutcome, request: &SearchRequest) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "Found {} concerts within {} miles of {}, {}.",
        outcome.events.len(),
        request.radius_miles,
        outcome.resolved.city,
        outcome.resolved.state,
    ));

    if !outcome.expansions.is_empty() {
        lines.push(String::new());
        lines.push("Also searching for similar artists:".to_string());
        for (seed, similar) in &outcome.expansions {
            lines.push(format!("  {}: {}", seed, similar.join(", ")));
        }
    }

    for event in &outcome.events {
        lines.push(String::new());
        lines.push(render_event(event));
    }

    if !outcome.failed_terms.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Note: no results could be fetched for: {}",
            outcome.failed_terms.join(", ")
        ));
    }

    lines.push(String::new());
    lines.join("\n")
}

fn render_event(event: &Event) -> String {
    let mut lines = vec![
        event.name.clone(),
        format!(
            "  When: {}",
            event.date_time.format("%a, %b %e, %Y %l:%M %p UTC")
        ),
    ];

    let mut venue_line = format!("  Where: {}", event.venue_name);
    if let Some(city) = &event.location.city {
        venue_line.push_str(&format!(", {city}"));
    }
    if let Some(state) = &event.location.state {
        venue_line.push_str(&format!(", {state}"));
    }
    if let Some(distance) = event.distance_miles {
        venue_line.push_str(&format!(" ({distance:.0} mi)"));
    }
    lines.push(venue_line);

    if let Some(price) = format_price(event.price_min_cents, event.price_max_cents) {
        lines.push(format!("  Price: {price}"));
    }
    if let Some(listeners) = event.listeners {
        lines.push(format!(
            "  {} listeners on Last.fm",
            format_listeners(listeners)
        ));
    }
    if let Some(url) = &event.url {
        lines.push(format!("  Tickets: {url}"));
    }

    lines.join("\n")
}

fn format_price(min_cents: Option<i64>, max_cents: Option<i64>) -> Option<String> {
    match (min_cents, max_cents) {
        (Some(min), Some(max)) if min != max => {
            Some(format!("${:.0} - ${:.0}", min as f64 / 100.0, max as f64 / 100.0))
        }
        (Some(min), _) => Some(format!("From ${:.0}", min as f64 / 100.0)),
        (None, Some(max)) => Some(format!("Up to ${:.0}", max as f64 / 100.0)),
        (None, None) => None,
    }
}

fn format_listeners(listeners: u64) -> String {
    if listeners >= 1_000_000 {
        format!("{:.1}M", listeners as f64 / 1_000_000.0)
    } else if listeners >= 1_000 {
        format!("{:.0}K", listeners as f64 / 1_000.0)
    } else {
        listeners.to_string()
    }
}
