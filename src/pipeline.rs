//! Per-page orchestration of analysis, detection and location.
//!
//! Pages run one after another against the analysis collaborator. A page
//! that fails is recorded in the manifest and skipped; only a document where
//! every page failed (or a cancelled run) is an error.

use crate::analysis::{AnalysisResponse, DocumentAnalyzer};
use crate::domain::block::line_text;
use crate::domain::{CardNumberMatcher, PatternMatcher, RedactionElement, TextBlock};
use crate::error::{AnalysisError, PageError, RedactorError, RedactorResult};
use crate::locate::BlockLocator;
use crate::pages::{PageImage, PageSplitter, SourceDocument, MIN_SCALE};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives human-readable status at each phase transition.
///
/// Called synchronously from the pipeline; implementations should return
/// quickly. A panicking observer is logged and otherwise ignored.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, status: &str, current: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(&str, usize, usize) + Send + Sync,
{
    fn on_progress(&self, status: &str, current: usize, total: usize) {
        self(status, current, total)
    }
}

/// Shared flag a caller flips to stop a run between pages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tunables for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rasterization oversampling factor (at least 2.0)
    pub scale: f32,
    /// Budget for each analyzer call; `None` waits indefinitely
    pub page_timeout: Option<Duration>,
    /// Distinct digit groups a WORD needs for group containment
    pub min_group_hits: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scale: MIN_SCALE,
            page_timeout: Some(Duration::from_secs(60)),
            min_group_hits: 1,
        }
    }
}

impl PipelineConfig {
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_page_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_min_group_hits(mut self, hits: usize) -> Self {
        self.min_group_hits = hits;
        self
    }
}

/// Manifest entry for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub page_index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elements: usize,
}

/// What a successfully analyzed page contributed.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub page_index: usize,
    pub text: String,
    pub elements: Vec<RedactionElement>,
}

/// Aggregated detection results for a whole document.
#[derive(Debug, Clone, Default)]
pub struct DocumentAnalysis {
    pub text: String,
    pub elements: Vec<RedactionElement>,
    pub pages: Vec<PageReport>,
}

impl DocumentAnalysis {
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| !p.success)
    }

    /// True when some, but not all, pages failed.
    pub fn is_partial(&self) -> bool {
        self.failed_pages().next().is_some()
    }

    /// Folds per-page results into a document result.
    ///
    /// Fails only when there was at least one page and none succeeded.
    pub fn aggregate(results: Vec<Result<PageOutcome, PageError>>) -> RedactorResult<Self> {
        let total = results.len();
        let mut analysis = DocumentAnalysis::default();
        let mut texts = Vec::new();
        let mut last_error = None;

        for (page_index, result) in results.into_iter().enumerate() {
            match result {
                Ok(outcome) => {
                    analysis.pages.push(PageReport {
                        page_index,
                        success: true,
                        error: None,
                        elements: outcome.elements.len(),
                    });
                    if !outcome.text.is_empty() {
                        texts.push(outcome.text);
                    }
                    analysis.elements.extend(outcome.elements);
                }
                Err(err) => {
                    let message = err.to_string();
                    analysis.pages.push(PageReport {
                        page_index,
                        success: false,
                        error: Some(message.clone()),
                        elements: 0,
                    });
                    last_error = Some(message);
                }
            }
        }

        if total > 0 && analysis.pages.iter().all(|p| !p.success) {
            return Err(RedactorError::NoPagesProcessed {
                pages: total,
                last_error: last_error.unwrap_or_default(),
            });
        }

        analysis.text = texts.join("\n");
        Ok(analysis)
    }
}

/// Drives splitting, analysis and detection for one document at a time.
pub struct RedactionPipeline {
    analyzer: Arc<dyn DocumentAnalyzer>,
    splitter: PageSplitter,
    matcher: Arc<dyn PatternMatcher>,
    locator: BlockLocator,
    page_timeout: Option<Duration>,
    observer: Option<Arc<dyn ProgressObserver>>,
    cancel: CancellationToken,
}

impl RedactionPipeline {
    /// Creates a pipeline with default configuration.
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        let config = PipelineConfig::default();
        Self {
            analyzer,
            splitter: PageSplitter::new(),
            matcher: Arc::new(CardNumberMatcher::new()),
            locator: BlockLocator::new().with_min_group_hits(config.min_group_hits),
            page_timeout: config.page_timeout,
            observer: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Applies `config`, validating the rasterization scale.
    pub fn with_config(mut self, config: PipelineConfig) -> RedactorResult<Self> {
        self.splitter = PageSplitter::new().with_scale(config.scale)?;
        self.locator = BlockLocator::new().with_min_group_hits(config.min_group_hits);
        self.page_timeout = config.page_timeout;
        Ok(self)
    }

    pub fn with_matcher(mut self, matcher: impl PatternMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn with_locator(mut self, locator: BlockLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn splitter(&self) -> &PageSplitter {
        &self.splitter
    }

    /// Splits `source` and analyzes every page.
    pub fn analyze_document(&self, source: &SourceDocument) -> RedactorResult<DocumentAnalysis> {
        self.report("Splitting document into pages", 0, 1);
        let pages = self.splitter.split(source)?;
        self.report(&format!("Split into {} page(s)", pages.len()), 1, 1);
        self.analyze_pages(pages)
    }

    /// Analyzes already-split pages in order.
    pub fn analyze_pages(&self, pages: Vec<PageImage>) -> RedactorResult<DocumentAnalysis> {
        let total = pages.len();
        let mut results = Vec::with_capacity(total);

        for (i, page) in pages.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(completed = i, "run cancelled");
                return Err(RedactorError::Cancelled { completed_pages: i });
            }

            self.report(&format!("Analyzing page {} of {}", i + 1, total), i, total);
            let result = self.process_page(Arc::new(page));
            match &result {
                Ok(outcome) => info!(
                    page = i + 1,
                    elements = outcome.elements.len(),
                    "page processed"
                ),
                Err(err) => warn!(page = i + 1, error = %err, "page failed"),
            }
            results.push(result);
            self.report(&format!("Finished page {} of {}", i + 1, total), i + 1, total);
        }

        DocumentAnalysis::aggregate(results)
    }

    /// Runs analysis and detection for one page.
    ///
    /// A panic in either step fails this page only.
    pub fn process_page(&self, page: Arc<PageImage>) -> Result<PageOutcome, PageError> {
        let index = page.index;
        let response = self
            .call_analyzer(page)
            .map_err(|e| PageError::new(index, e))?;
        catch_unwind(AssertUnwindSafe(|| self.detect_page(index, &response.blocks))).map_err(|_| {
            PageError::new(
                index,
                AnalysisError::Detection("card detection panicked".to_string()),
            )
        })
    }

    /// Finds, locates and classifies card numbers among one page's blocks.
    pub fn detect_page(&self, page_index: usize, blocks: &[TextBlock]) -> PageOutcome {
        let text = line_text(blocks);
        let matches = self.matcher.find_matches(&text);
        debug!(page = page_index + 1, matches = matches.len(), "pattern scan");

        let elements = matches
            .iter()
            .enumerate()
            .filter_map(|(j, m)| {
                self.locator
                    .resolve(m, blocks, page_index, format!("p{}-m{}", page_index + 1, j))
            })
            .collect();

        PageOutcome {
            page_index,
            text,
            elements,
        }
    }

    fn call_analyzer(&self, page: Arc<PageImage>) -> Result<AnalysisResponse, AnalysisError> {
        let Some(limit) = self.page_timeout else {
            return catch_unwind(AssertUnwindSafe(|| self.analyzer.analyze(&page)))
                .unwrap_or_else(|_| Err(AnalysisError::Aborted("analyzer panicked".to_string())));
        };

        let (tx, rx) = mpsc::channel();
        let analyzer = Arc::clone(&self.analyzer);
        let number = page.number();
        thread::Builder::new()
            .name(format!("analyze-page-{}", number))
            .spawn(move || {
                // The receiver is gone if we already timed out.
                let _ = tx.send(analyzer.analyze(&page));
            })
            .map_err(|e| AnalysisError::Aborted(format!("cannot spawn analyzer thread: {}", e)))?;

        match rx.recv_timeout(limit) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => Err(AnalysisError::Timeout(limit)),
            Err(RecvTimeoutError::Disconnected) => Err(AnalysisError::Aborted(
                "analyzer thread exited without a response".to_string(),
            )),
        }
    }

    pub(crate) fn report(&self, status: &str, current: usize, total: usize) {
        let Some(observer) = &self.observer else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| observer.on_progress(status, current, total))).is_err()
        {
            warn!(status, "progress observer panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BlockKind;
    use crate::geometry::NormalizedBox;
    use std::sync::Mutex;

    struct Fixed(Vec<TextBlock>);

    impl DocumentAnalyzer for Fixed {
        fn analyze(&self, _page: &PageImage) -> Result<AnalysisResponse, AnalysisError> {
            Ok(AnalysisResponse::new(self.0.clone()))
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    struct Slow;

    impl DocumentAnalyzer for Slow {
        fn analyze(&self, _page: &PageImage) -> Result<AnalysisResponse, AnalysisError> {
            thread::sleep(Duration::from_millis(500));
            Ok(AnalysisResponse::default())
        }

        fn name(&self) -> &str {
            "Slow"
        }
    }

    fn card_line() -> TextBlock {
        TextBlock::new("l1", "Card: 4111 1111 1111 1111 exp 12/25", BlockKind::Line)
            .with_box(NormalizedBox::new(0.1, 0.2, 0.5, 0.02))
    }

    #[test]
    fn test_detect_page_end_to_end() {
        let pipeline = RedactionPipeline::new(Arc::new(Fixed(vec![])));
        let outcome = pipeline.detect_page(0, &[card_line()]);
        assert_eq!(outcome.elements.len(), 1);
        assert_eq!(outcome.elements[0].text, "**** **** **** 1111");
        assert_eq!(outcome.elements[0].kind, BlockKind::Line);
    }

    #[test]
    fn test_zero_pages_is_success() {
        let pipeline = RedactionPipeline::new(Arc::new(Fixed(vec![])));
        let analysis = pipeline.analyze_pages(Vec::new()).unwrap();
        assert!(analysis.pages.is_empty());
        assert!(analysis.elements.is_empty());
    }

    #[test]
    fn test_timeout_fails_page() {
        let pipeline = RedactionPipeline::new(Arc::new(Slow))
            .with_config(
                PipelineConfig::default().with_page_timeout(Some(Duration::from_millis(20))),
            )
            .unwrap();
        let err = pipeline.analyze_pages(vec![PageImage::blank(0, 10, 10)]).unwrap_err();
        assert!(matches!(err, RedactorError::NoPagesProcessed { pages: 1, .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_cancel_between_pages() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let pipeline = RedactionPipeline::new(Arc::new(Fixed(vec![card_line()])))
            .with_cancellation(token)
            .with_observer(move |status: &str, _current: usize, _total: usize| {
                if status.starts_with("Finished page 1") {
                    trigger.cancel();
                }
            });

        let pages = (0..3).map(|i| PageImage::blank(i, 10, 10)).collect();
        let err = pipeline.analyze_pages(pages).unwrap_err();
        assert!(matches!(err, RedactorError::Cancelled { completed_pages: 1 }));
    }

    #[test]
    fn test_progress_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let pipeline = RedactionPipeline::new(Arc::new(Fixed(vec![])))
            .with_observer(move |status: &str, current: usize, total: usize| {
                sink.lock().unwrap().push((status.to_string(), current, total));
            });

        let pages = (0..2).map(|i| PageImage::blank(i, 10, 10)).collect();
        pipeline.analyze_pages(pages).unwrap();

        let events = events.lock().unwrap();
        let pairs: Vec<(usize, usize)> = events.iter().map(|(_, c, t)| (*c, *t)).collect();
        assert_eq!(pairs, vec![(0, 2), (1, 2), (1, 2), (2, 2)]);
        assert_eq!(events[0].0, "Analyzing page 1 of 2");
    }

    #[test]
    fn test_panicking_observer_is_ignored() {
        let pipeline = RedactionPipeline::new(Arc::new(Fixed(vec![])))
            .with_observer(|_: &str, _: usize, _: usize| panic!("observer bug"));
        assert!(pipeline
            .analyze_pages(vec![PageImage::blank(0, 10, 10)])
            .is_ok());
    }
}
