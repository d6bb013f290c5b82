// Main entry point - Dependency injection and a single dashboard render
use std::sync::Arc;
use std::time::Duration;

use analytics_sync::application::engine::{DashboardEngine, EngineDeps, EngineSettings};
use analytics_sync::application::ports::SystemClock;
use analytics_sync::infrastructure::config::load_settings;
use analytics_sync::infrastructure::http_fetcher::HttpFetcher;
use analytics_sync::infrastructure::memory_route::MemoryRoute;
use analytics_sync::infrastructure::tracing_notifier::TracingNotifier;
use analytics_sync::presentation::format::NumberFormat;
use analytics_sync::presentation::view_models::DashboardView;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let settings = load_settings()?;
    let engine_settings = EngineSettings::from(&settings.engine);
    let number_format = NumberFormat::from(&settings.format);

    // Address to start from, e.g. "?dateFrom=2024-01-01&dateTo=2024-06-30&year=2024&month=3"
    let query = std::env::args().nth(1).unwrap_or_default();

    // Create collaborators (infrastructure layer)
    let fetcher = Arc::new(HttpFetcher::new(
        settings.api.base_url.clone(),
        settings.api.token.clone(),
        Duration::from_millis(settings.api.timeout_ms),
    )?);
    let route = Arc::new(MemoryRoute::from_query(&query));
    let (_entitlement_tx, entitlement_rx) = watch::channel(settings.access.can_filter_by_customer);

    // Create engine (application layer)
    let engine = DashboardEngine::new(
        EngineDeps {
            fetcher,
            route: route.clone(),
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            entitlement: entitlement_rx,
        },
        engine_settings,
    );

    engine.refresh_all(true).await;

    // Render (presentation layer)
    let view = DashboardView::from_snapshot(&engine.snapshot(), &number_format);
    print_view(&view);
    println!();
    println!("Shareable query: {}", route.query());

    engine.dispose();
    Ok(())
}

fn print_view(view: &DashboardView) {
    println!("== KPIs");
    for card in &view.kpis {
        println!("  {:<16} {:>18}", card.label, card.value);
    }

    println!("== Monthly trend");
    for bar in &view.trend {
        let marker = if bar.is_active { "*" } else { " " };
        println!("{} {:<10} {:>18}", marker, bar.label, bar.value);
    }

    if let Some(month) = &view.active_month {
        println!("== Daily breakdown: {}", month);
        for row in &view.daily {
            println!(
                "  {:>2}  {:>14}  {:>6} orders  avg {:>10}",
                row.day, row.revenue, row.orders, row.average_order_value
            );
        }
    }

    for error in &view.errors {
        eprintln!("! {}", error);
    }
}
