use tokio_util::sync::CancellationToken;

use crate::app::{AppContext, Result};
use crate::discovery::{BreakerState, CircuitBreaker};
use crate::domain::{AiFilter, FilterParams, IdCursor, ResourceDescriptor, SortMode};
use crate::scraper::{format_interval, ScrapeEvent, ScraperService};

fn print_item(item: &ResourceDescriptor) {
    let quality = if item.quality.is_labeled() {
        item.quality.as_str()
    } else {
        "-"
    };
    let ai = if item.is_ai_generated { " [AI]" } else { "" };
    println!(
        "{:>10}  {:<3}  {}{}\n            {}",
        item.id(),
        quality,
        item.display_title(),
        ai,
        item.full_url
    );
}

fn print_breaker(breaker: &CircuitBreaker) {
    match breaker.state() {
        BreakerState::Closed {
            consecutive_failures,
        } => println!(
            "  {}: available ({} recent failures)",
            breaker.name(),
            consecutive_failures
        ),
        BreakerState::Open { until } => println!(
            "  {}: suspended until {}",
            breaker.name(),
            until.format("%H:%M:%S")
        ),
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

pub async fn show_feed(ctx: &AppContext, more: usize) -> Result<()> {
    let loader = ctx.feed_loader();

    let initial = loader.load_initial().await;
    println!("Loaded {} items", initial.len());
    for item in &initial {
        print_item(item);
    }

    for round in 1..=more {
        let batch = loader.load_more().await;
        println!("Round {}: {} new items", round, batch.len());
        for item in &batch {
            print_item(item);
        }
    }

    loader.shutdown().await;

    let snapshot = loader.pipeline().snapshot();
    println!(
        "Feed holds {} items (next page {}, next id {})",
        loader.len(),
        snapshot.next_page,
        snapshot
            .next_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into())
    );
    print_breaker(&ctx.sources.api_breaker);
    print_breaker(&ctx.sources.scan_breaker);
    Ok(())
}

pub async fn scan(ctx: &AppContext, cursor: Option<u64>, batch: Option<usize>) -> Result<()> {
    let start = cursor.unwrap_or(ctx.config.scanner.start_id);
    let batch_size = batch.unwrap_or(ctx.config.scanner.batch_size);
    let mut id_cursor = IdCursor::new(start);

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    println!("Probing {} ids from {}...", batch_size, start);
    let scanner = &ctx.sources.scanner;
    let result = scanner.scan_batch(&mut id_cursor, batch_size, &cancel).await;

    for item in &result.report.found {
        print_item(item);
    }
    if result.report.cancelled {
        println!("Interrupted");
    }

    let stats = scanner.stats();
    println!(
        "Found {} of {} probed ({} not found, {} failed). Next cursor: {}",
        result.report.found.len(),
        stats.total(),
        result.report.not_found,
        stats.failed(),
        result
            .next_cursor
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into())
    );
    Ok(())
}

pub async fn fetch_page(
    ctx: &AppContext,
    page: u32,
    category: Option<String>,
    ai: Option<AiFilter>,
    sort: Option<SortMode>,
) -> Result<()> {
    let mut filter: FilterParams = ctx
        .settings
        .get()
        .map(|prefs| prefs.filter)
        .unwrap_or_else(|_| ctx.config.filter.clone());
    if let Some(category) = category {
        filter.category = category;
    }
    if let Some(ai) = ai {
        filter.ai = ai;
    }
    if let Some(sort) = sort {
        filter.sort = sort;
    }

    let items = ctx
        .sources
        .pages
        .fetch_page(page, ctx.config.api.page_size, &filter)
        .await?;

    if items.is_empty() {
        println!("Page {} is empty", page);
        return Ok(());
    }

    println!(
        "Page {} ({} / {} / ai={}): {} items",
        page,
        filter.sort,
        filter.category,
        filter.ai,
        items.len()
    );
    for item in &items {
        print_item(item);
    }
    Ok(())
}

pub async fn watch(ctx: &AppContext, interval: Option<String>, no_initial: bool) -> Result<()> {
    let mut config = ctx.config.scraper.clone();
    if let Some(interval) = interval {
        config.interval = interval;
    }
    if no_initial {
        config.run_on_start = false;
    }

    let filter = ctx
        .settings
        .get()
        .map(|prefs| prefs.filter)
        .unwrap_or_else(|_| ctx.config.filter.clone());
    let service = ScraperService::new(ctx.sources.clone(), ctx.pipeline_config(), config, filter)?;
    let mut events = service.subscribe();

    println!(
        "Watching for new wallpapers every {} (Ctrl-C to stop)",
        format_interval(service.period().as_secs())
    );
    service.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ScrapeEvent::NewResources { category, items, .. }) => {
                    println!("{} new in '{}'", items.len(), category);
                    for item in &items {
                        print_item(item);
                    }
                }
                Ok(ScrapeEvent::RunFinished(report)) => {
                    println!(
                        "Run finished: {} pages, {} new{}",
                        report.pages,
                        report.published,
                        if report.used_fallback { " (fallback used)" } else { "" }
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    eprintln!("Missed {} events", missed);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    println!("Stopping, waiting for the current run to finish...");
    service.shutdown().await;
    Ok(())
}
