use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use sitemap_crawler::output::OutputFormat;
use sitemap_crawler::{config, Crawler};

#[tokio::main]
async fn main() {
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    let level = if cfg.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let logger = env_logger::Builder::from_default_env()
        .filter_level(level)
        .build();

    let multi = MultiProgress::new();
    let show_bar = !cfg.quiet && cfg.output_format == OutputFormat::Text;
    if show_bar {
        indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
            .try_init()
            .unwrap();
    } else {
        log::set_boxed_logger(Box::new(logger)).unwrap();
    }
    log::set_max_level(level);

    let crawler = match Crawler::new(cfg.clone()) {
        Ok(crawler) => crawler,
        Err(err) => {
            log::error!("failed to initialize crawler: {err}");
            std::process::exit(1);
        }
    };

    // Operator interrupt cancels the shared token.
    let cancel = crawler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, shutting down");
            cancel.cancel();
        }
    });

    let mut progress_bar = None;
    let mut _progress_task = None;
    if show_bar {
        let pb = multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut progress_rx = crawler.watch_progress();
        let pb_clone = pb.clone();
        progress_bar = Some(pb);
        _progress_task = Some(tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let progress = progress_rx.borrow().clone();
                pb_clone.set_length(progress.total as u64);
                pb_clone.set_position(progress.processed as u64);
                pb_clone.set_message(format!(
                    "Success: {:.1}% | {:.1} req/s",
                    progress.success_rate, progress.requests_per_second
                ));
            }
        }));
    }

    let outcome = crawler.run().await;

    if let Some(task) = _progress_task {
        task.abort();
    }
    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    // Reports are printed even after a failed run so operators still see
    // the partial numbers.
    let formatter = cfg.output_format.formatter();
    if cfg.cache_verification_mode {
        println!("{}", formatter.format_cache(&crawler.cache_report().await));
    } else {
        println!("{}", formatter.format_final(&crawler.final_report().await));
    }

    if let Err(err) = outcome {
        log::error!("crawler failed: {err}");
        std::process::exit(1);
    }
}
