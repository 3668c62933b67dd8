use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::parse::RowExtractor;
use crate::request::{FetchSettings, PageFetcher, ReqwestFetcher};
use crate::sink::{SinkTarget, TsvSink};
use crate::{info_time, Result, DEFAULT_MAX_PAGE, START_PAGE};

/// Knobs of the harvest loop itself. Transport settings live in `FetchSettings`.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Last page that will be requested, inclusive.
    pub max_page: usize,
    /// Pause after every page that produced rows, so the upstream isn't hammered.
    pub page_delay: Duration,
    /// Pause after a page that failed to fetch.
    pub error_delay: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            max_page: DEFAULT_MAX_PAGE,
            page_delay: Duration::from_millis(500),
            error_delay: Duration::from_secs(2),
        }
    }
}

/// Why a harvest ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every page up to `max_page` was visited.
    PageLimit,
    /// A page came back without any rows.
    EndOfData,
    /// The cancellation token fired.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HarvestState {
    Running,
    Stopping,
    Done(StopReason),
}

/// What a finished harvest reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub total_records: usize,
    /// The page cursor when the loop stopped.
    /// For `EndOfData` this is the empty page, otherwise the first page that wasn't visited.
    pub current_page: usize,
    pub output: PathBuf,
    pub stop_reason: StopReason,
}

/// Cursor and counters of one run. Lives and dies with `HarvestLoop::run`.
#[derive(Debug)]
struct HarvestSession {
    current_page: usize,
    max_page: usize,
    total_records: usize,
    stop_requested: CancellationToken,
}

/// Drives fetch -> extract -> append -> flush -> paginate, one page at a time.
pub struct HarvestLoop<F> {
    fetcher: F,
    extractor: RowExtractor,
    settings: HarvestSettings,
    session: HarvestSession,
}

impl<F: PageFetcher> HarvestLoop<F> {
    /// `stop` is only ever checked between pages: once it fires the page in flight is
    /// still written out, and no further page is requested.
    pub fn new(fetcher: F, settings: HarvestSettings, stop: CancellationToken) -> Result<Self> {
        let session = HarvestSession {
            current_page: START_PAGE,
            max_page: settings.max_page,
            total_records: 0,
            stop_requested: stop,
        };
        Ok(Self {
            fetcher,
            extractor: RowExtractor::new()?,
            settings,
            session,
        })
    }

    /// Runs the harvest into a fresh TSV file at `output`.
    pub async fn run(self, output: impl AsRef<Path>) -> Result<HarvestReport> {
        let output = output.as_ref();
        let sink = match TsvSink::create(output).await {
            Ok(sink) => sink,
            Err(err) => {
                error!(error = %err, "Couldn't open the output file");
                print_summary(0, output);
                return Err(err);
            }
        };
        self.run_into(sink).await
    }

    /// Runs the harvest into an already opened sink.
    ///
    /// The sink is flushed and closed on every way out. On a sink failure the returned
    /// error carries the number of records that made it to disk.
    pub async fn run_into<W: SinkTarget>(mut self, mut sink: TsvSink<W>) -> Result<HarvestReport> {
        let start_time = Local::now();
        let output = sink.path().to_path_buf();

        let outcome = self.drive(&mut sink).await;
        let closed = sink.close().await;

        let total_records = self.session.total_records;
        info_time!(start_time, "Harvest stopped.");
        print_summary(total_records, &output);

        let stop_reason = match (outcome, closed) {
            (Ok(reason), Ok(_)) => reason,
            (Err(err), _) | (Ok(_), Err(err)) => {
                error!(
                    error = %err,
                    page = self.session.current_page,
                    output = %output.display(),
                    "Harvest aborted"
                );
                return Err(err);
            }
        };

        Ok(HarvestReport {
            total_records,
            current_page: self.session.current_page,
            output,
            stop_reason,
        })
    }

    async fn drive<W: SinkTarget>(&mut self, sink: &mut TsvSink<W>) -> Result<StopReason> {
        let mut state = HarvestState::Running;
        loop {
            state = match state {
                HarvestState::Running => self.step(sink).await?,
                HarvestState::Stopping => {
                    info_time!(
                        "Stop requested, not fetching page {}.",
                        self.session.current_page
                    );
                    HarvestState::Done(StopReason::Interrupted)
                }
                HarvestState::Done(reason) => return Ok(reason),
            };
        }
    }

    /// One page. Only a sink failure escapes as an error.
    async fn step<W: SinkTarget>(&mut self, sink: &mut TsvSink<W>) -> Result<HarvestState> {
        let session = &mut self.session;
        if session.stop_requested.is_cancelled() {
            return Ok(HarvestState::Stopping);
        }
        if session.current_page > session.max_page {
            return Ok(HarvestState::Done(StopReason::PageLimit));
        }

        let page_num = session.current_page;
        debug!(
            page = page_num,
            max_page = session.max_page,
            total_records = session.total_records,
            "Fetching page"
        );

        let html = match self.fetcher.fetch_page(page_num).await {
            Ok(html) => html,
            Err(err) => {
                warn!(page = page_num, kind = %err.kind, error = %err, "Error fetching page, skipping it");
                tokio::time::sleep(self.settings.error_delay).await;
                session.current_page += 1;
                return Ok(HarvestState::Running);
            }
        };

        let records = self.extractor.extract(&html);
        if records.is_empty() {
            info_time!("No matches found on page {page_num}. Stopping.");
            return Ok(HarvestState::Done(StopReason::EndOfData));
        }

        let appended = sink.append_page(&records).await?;
        session.total_records += appended;
        debug!(
            page = page_num,
            appended,
            total_records = session.total_records,
            "Page saved"
        );

        tokio::time::sleep(self.settings.page_delay).await;
        session.current_page += 1;
        Ok(HarvestState::Running)
    }
}

fn print_summary(total_records: usize, output: &Path) {
    info_time!(
        "Saved {} records to {}",
        total_records,
        output.display()
    );
}

/// Harvests the live listing over HTTP into `output`.
pub async fn harvest_site(
    settings: HarvestSettings,
    fetch_settings: &FetchSettings,
    output: impl AsRef<Path>,
    stop: CancellationToken,
) -> Result<HarvestReport> {
    let fetcher = ReqwestFetcher::new(fetch_settings)?;
    let output = output.as_ref();

    info_time!(
        "Starting harvest. Target: Pages {START_PAGE} to {}",
        settings.max_page
    );
    info_time!("Saving to: {}", output.display());
    info_time!("Press Ctrl+C to stop safely.");

    HarvestLoop::new(fetcher, settings, stop)?.run(output).await
}
