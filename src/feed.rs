//! Paginated notification feed.
//!
//! A [`Feed`] owns the state of one mounted notification tab: the records
//! loaded so far, the page cursor and the loading/exhaustion flags. Pages are
//! fetched on a worker thread and picked up by [`Feed::poll`] on the UI
//! thread, so every state transition happens in one place.
//!
//! The next page is requested when the last rendered card scrolls into view.
//! The UI reports that through [`Feed::observe_last_item`] and
//! [`Feed::report_visibility`]; the feed keeps a single [`Sentinel`] for it.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        mpsc::{self, Receiver, TryRecvError},
    },
    thread,
};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    api::{ApiError, NotificationPage, NotificationSource, PageRequest},
    bus::{BusEvent, FeedId, FeedMutation, MutationBus},
    domain::{Category, NotificationRecord},
};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// What the tab should render right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedPhase {
    /// Skeleton placeholders.
    LoadingFirstPage,
    /// Cards plus an inline spinner below them.
    LoadingMore,
    /// The first page failed; nothing to show but the error and a retry.
    Failed,
    /// Cards are shown but the latest page failed to load.
    Stalled,
    Empty,
    Populated { has_more: bool },
}

/// Everything the card renderer needs for one record.
pub struct CardView<'a> {
    pub record: &'a NotificationRecord,
    pub time_ago: String,
    pub is_unread: bool,
    pub is_first: bool,
    pub is_last: bool,
}

pub struct Feed {
    id: FeedId,
    category: Category,
    page_size: usize,
    source: Arc<dyn NotificationSource>,
    bus: MutationBus,
    subscription: Receiver<BusEvent>,
    items: Vec<NotificationRecord>,
    seen: HashSet<String>,
    page: u32,
    loaded_page: u32,
    loading: bool,
    has_more: bool,
    stalled: bool,
    last_error: Option<String>,
    pending_page: Option<PendingPage>,
    pending_actions: Vec<ActionJob>,
    notices: Vec<String>,
    sentinel: Sentinel,
}

impl Feed {
    /// Creates the feed for a freshly mounted tab and requests its first page.
    pub fn mount(
        category: Category,
        page_size: usize,
        source: Arc<dyn NotificationSource>,
        bus: MutationBus,
    ) -> Self {
        let subscription = bus.subscribe();
        let mut feed = Self {
            id: FeedId::next(),
            category,
            page_size: page_size.max(1),
            source,
            bus,
            subscription,
            items: Vec::new(),
            seen: HashSet::new(),
            page: 1,
            loaded_page: 0,
            loading: false,
            has_more: true,
            stalled: false,
            last_error: None,
            pending_page: None,
            pending_actions: Vec::new(),
            notices: Vec::new(),
            sentinel: Sentinel::default(),
        };
        feed.initialize(category);
        feed
    }

    /// Resets to the first page of `category`. An outstanding page request is
    /// abandoned; its result is never applied.
    pub fn initialize(&mut self, category: Category) {
        self.category = category;
        self.items.clear();
        self.seen.clear();
        self.page = 1;
        self.loaded_page = 0;
        self.loading = false;
        self.has_more = true;
        self.stalled = false;
        self.last_error = None;
        self.pending_page = None;
        self.sentinel.detach();
        self.sync_page();
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn items(&self) -> &[NotificationRecord] {
        &self.items
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_read).count()
    }

    pub fn phase(&self) -> FeedPhase {
        match (self.loading, self.items.is_empty()) {
            (true, true) => FeedPhase::LoadingFirstPage,
            (true, false) => FeedPhase::LoadingMore,
            (false, true) if self.stalled => FeedPhase::Failed,
            (false, true) => FeedPhase::Empty,
            (false, false) if self.stalled => FeedPhase::Stalled,
            (false, false) => FeedPhase::Populated {
                has_more: self.has_more,
            },
        }
    }

    pub fn cards(&self, now: DateTime<Utc>) -> Vec<CardView<'_>> {
        let last = self.items.len().saturating_sub(1);
        self.items
            .iter()
            .enumerate()
            .map(|(idx, record)| CardView {
                record,
                time_ago: record.time_ago(now),
                is_unread: !record.is_read,
                is_first: idx == 0,
                is_last: idx == last,
            })
            .collect()
    }

    /// Transient messages for the toast area; draining.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Applies finished background work and mutations broadcast by other feeds.
    pub fn poll(&mut self) {
        if let Some(job) = &self.pending_page
            && let Some(result) = job.try_take()
        {
            self.pending_page = None;
            self.finish_page(result);
        }
        self.poll_action_jobs();
        self.poll_broadcasts();
    }

    // -------------------------------------------------------------------------
    // Pagination
    // -------------------------------------------------------------------------

    /// Registers the card with `id` as the element whose visibility loads the
    /// next page. Ignored while a page is loading or when `id` is not the
    /// current last record.
    pub fn observe_last_item(&mut self, id: &str) {
        if self.loading {
            return;
        }
        if self.items.last().map(|item| item.id.as_str()) != Some(id) {
            return;
        }
        self.sentinel.attach(id);
    }

    pub fn report_visibility(&mut self, id: &str, visible: bool) {
        if self.sentinel.observe(id, visible) {
            self.on_intersect();
        }
    }

    /// Re-requests the page that last failed.
    pub fn retry(&mut self) {
        if self.loading || !self.stalled {
            return;
        }
        self.stalled = false;
        self.last_error = None;
        self.sync_page();
    }

    fn on_intersect(&mut self) {
        if self.loading || !self.has_more {
            return;
        }
        if self.stalled {
            // Same page again rather than skipping the one that failed.
            self.retry();
            return;
        }
        self.page += 1;
        self.sync_page();
    }

    /// Requests the current page when it has not been loaded yet. Every page
    /// fetch goes through here.
    fn sync_page(&mut self) {
        if self.loading || self.stalled || self.page <= self.loaded_page {
            return;
        }
        let request = PageRequest {
            page: self.page,
            page_size: self.page_size,
            category: self.category,
        };
        debug!(feed = ?self.id, page = request.page, category = ?request.category, "fetching page");
        self.loading = true;
        self.pending_page = Some(PendingPage::spawn(Arc::clone(&self.source), request));
    }

    fn finish_page(&mut self, result: PageOutcome) {
        self.loading = false;
        match result {
            Ok(NotificationPage { records, returned }) => {
                for record in records {
                    if self.seen.insert(record.id.clone()) {
                        self.items.push(record);
                    }
                }
                self.loaded_page = self.page;
                self.has_more = returned >= self.page_size;
                self.last_error = None;
                // Re-arm so a last card that is still in view fires again.
                self.sentinel.detach();
                debug!(
                    feed = ?self.id,
                    page = self.page,
                    returned,
                    has_more = self.has_more,
                    "page loaded"
                );
            }
            Err(err) => {
                warn!(feed = ?self.id, page = self.page, error = %err, "failed to load page");
                self.stalled = true;
                self.last_error = Some(err.to_string());
                let notice = format!("Failed to load {}", self.category.noun());
                self.notices.push(notice);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    pub fn mark_as_read(&mut self, id: &str) {
        self.mutate(FeedMutation::MarkRead(id.to_owned()));
    }

    pub fn delete_item(&mut self, id: &str) {
        self.mutate(FeedMutation::Delete(id.to_owned()));
    }

    /// "Show less like this".
    pub fn demote_item(&mut self, id: &str) {
        self.mutate(FeedMutation::Demote(id.to_owned()));
    }

    fn mutate(&mut self, mutation: FeedMutation) {
        if !self.apply(&mutation) {
            return;
        }
        self.bus.publish(BusEvent {
            origin: self.id,
            mutation: mutation.clone(),
        });
        self.pending_actions
            .push(ActionJob::spawn(Arc::clone(&self.source), mutation));
    }

    /// Local optimistic change; false when no record has that id.
    fn apply(&mut self, mutation: &FeedMutation) -> bool {
        let Some(idx) = self.items.iter().position(|item| item.id == mutation.id()) else {
            return false;
        };
        match mutation {
            FeedMutation::MarkRead(_) => self.items[idx].is_read = true,
            // Id stays in `seen` so a later page cannot bring it back.
            FeedMutation::Delete(_) => {
                self.items.remove(idx);
            }
            FeedMutation::Demote(_) => self.items[idx].demoted = true,
        }
        true
    }

    fn poll_action_jobs(&mut self) {
        let mut failed = Vec::new();
        self.pending_actions.retain(|job| match job.try_take() {
            None => true,
            Some(Ok(())) => false,
            Some(Err(err)) => {
                failed.push((job.mutation.clone(), err));
                false
            }
        });
        self.report_action_failures(failed);
    }

    /// Failed remote updates are surfaced; the local change is kept.
    fn report_action_failures(&mut self, failed: Vec<(FeedMutation, ApiError)>) {
        for (mutation, err) in failed {
            warn!(
                id = mutation.id(),
                action = mutation.verb(),
                error = %err,
                "remote update failed"
            );
            self.notices.push(format!("Couldn't {}: {err}", mutation.verb()));
        }
    }

    fn poll_broadcasts(&mut self) {
        while let Ok(event) = self.subscription.try_recv() {
            if event.origin != self.id {
                self.apply(&event.mutation);
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Sentinel
// -----------------------------------------------------------------------------

/// Single-subscription visibility trigger for the last rendered card.
#[derive(Debug, Default)]
pub struct Sentinel {
    target: Option<String>,
    visible: bool,
}

impl Sentinel {
    /// Observes `id`, dropping any previous target. Re-attaching the current
    /// target keeps its state.
    pub fn attach(&mut self, id: &str) {
        if self.target.as_deref() == Some(id) {
            return;
        }
        self.detach();
        self.target = Some(id.to_owned());
    }

    pub fn detach(&mut self) {
        self.target = None;
        self.visible = false;
    }

    #[cfg(test)]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Records the visibility of `id`; true when the observed target has just
    /// entered the viewport.
    pub fn observe(&mut self, id: &str, visible: bool) -> bool {
        if self.target.as_deref() != Some(id) {
            return false;
        }
        let entered = visible && !self.visible;
        self.visible = visible;
        entered
    }
}

// -----------------------------------------------------------------------------
// Background jobs
// -----------------------------------------------------------------------------

type PageOutcome = Result<NotificationPage, ApiError>;

struct PendingPage {
    receiver: Receiver<PageOutcome>,
}

impl PendingPage {
    fn spawn(source: Arc<dyn NotificationSource>, request: PageRequest) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver is gone when the feed was reset or dropped.
            let _ = tx.send(source.fetch_page(&request));
        });
        Self { receiver: rx }
    }

    fn try_take(&self) -> Option<PageOutcome> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ApiError::BackgroundWorkerGone)),
        }
    }
}

struct ActionJob {
    mutation: FeedMutation,
    receiver: Receiver<Result<(), ApiError>>,
}

impl ActionJob {
    fn spawn(source: Arc<dyn NotificationSource>, mutation: FeedMutation) -> Self {
        let (tx, rx) = mpsc::channel();
        let job_mutation = mutation.clone();
        thread::spawn(move || {
            let outcome = match &job_mutation {
                FeedMutation::MarkRead(id) => source.mark_read(id),
                FeedMutation::Delete(id) => source.delete(id),
                FeedMutation::Demote(id) => source.demote(id),
            };
            let _ = tx.send(outcome);
        });
        Self {
            mutation,
            receiver: rx,
        }
    }

    fn try_take(&self) -> Option<Result<(), ApiError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ApiError::BackgroundWorkerGone)),
        }
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::Mutex,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::domain::NotificationKind;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct ScriptedSource {
        pages: Mutex<VecDeque<PageOutcome>>,
        requests: Mutex<Vec<PageRequest>>,
        actions: Mutex<Vec<FeedMutation>>,
        fail_actions: bool,
        /// When set, every page holds this many records named after the request.
        echo: Option<usize>,
    }

    impl ScriptedSource {
        fn with_pages(pages: Vec<PageOutcome>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into()),
                ..Self::default()
            })
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().expect("lock").clone()
        }

        fn actions(&self) -> Vec<FeedMutation> {
            self.actions.lock().expect("lock").clone()
        }

        fn record_action(&self, mutation: FeedMutation) -> Result<(), ApiError> {
            self.actions.lock().expect("lock").push(mutation);
            if self.fail_actions {
                Err(ApiError::Rejected("nope".into()))
            } else {
                Ok(())
            }
        }
    }

    impl NotificationSource for ScriptedSource {
        fn fetch_page(&self, request: &PageRequest) -> PageOutcome {
            let outcome = match self.echo {
                Some(count) => {
                    let prefix = format!("{:?}-{}-", request.category, request.page);
                    page(&prefix, count)
                }
                None => self
                    .pages
                    .lock()
                    .expect("lock")
                    .pop_front()
                    .unwrap_or_else(|| Ok(NotificationPage::default())),
            };
            // Recorded last: a logged request means its page was consumed.
            self.requests.lock().expect("lock").push(*request);
            outcome
        }

        fn mark_read(&self, id: &str) -> Result<(), ApiError> {
            self.record_action(FeedMutation::MarkRead(id.into()))
        }

        fn delete(&self, id: &str) -> Result<(), ApiError> {
            self.record_action(FeedMutation::Delete(id.into()))
        }

        fn demote(&self, id: &str) -> Result<(), ApiError> {
            self.record_action(FeedMutation::Demote(id.into()))
        }
    }

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord {
            id: id.to_owned(),
            kind: NotificationKind::Like,
            created_at: Utc::now(),
            is_read: false,
            demoted: false,
            sender: None,
            post: None,
            comment: None,
            content: None,
            like: None,
            bookmark: None,
        }
    }

    fn page(prefix: &str, count: usize) -> PageOutcome {
        let records: Vec<_> = (0..count).map(|n| record(&format!("{prefix}{n}"))).collect();
        Ok(records.into())
    }

    fn ids(feed: &Feed) -> Vec<&str> {
        feed.items().iter().map(|item| item.id.as_str()).collect()
    }

    impl Feed {
        /// Blocks until the outstanding page and action jobs have landed.
        fn settle(&mut self) {
            if let Some(job) = self.pending_page.take() {
                let result = job
                    .receiver
                    .recv_timeout(WAIT)
                    .unwrap_or(Err(ApiError::BackgroundWorkerGone));
                self.finish_page(result);
            }
            let failed = std::mem::take(&mut self.pending_actions)
                .into_iter()
                .filter_map(|job| match job.receiver.recv_timeout(WAIT) {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => Some((job.mutation, err)),
                    Err(_) => Some((job.mutation, ApiError::BackgroundWorkerGone)),
                })
                .collect();
            self.report_action_failures(failed);
            self.poll_broadcasts();
        }

        /// Scrolls the current last card into view.
        fn reveal_last(&mut self) {
            let Some(last) = self.items().last().map(|item| item.id.clone()) else {
                return;
            };
            self.observe_last_item(&last);
            self.report_visibility(&last, true);
        }
    }

    fn mounted(source: &Arc<ScriptedSource>, category: Category) -> Feed {
        mounted_on(source, category, MutationBus::default())
    }

    fn mounted_on(source: &Arc<ScriptedSource>, category: Category, bus: MutationBus) -> Feed {
        let source: Arc<dyn NotificationSource> = source.clone();
        Feed::mount(category, DEFAULT_PAGE_SIZE, source, bus)
    }

    #[test]
    fn mount_requests_first_page() {
        let source = ScriptedSource::with_pages(vec![page("a", 10)]);
        let mut feed = mounted(&source, Category::Mentions);
        assert!(feed.is_loading());
        assert_eq!(feed.phase(), FeedPhase::LoadingFirstPage);

        feed.settle();
        assert_eq!(
            source.requests(),
            vec![PageRequest {
                page: 1,
                page_size: DEFAULT_PAGE_SIZE,
                category: Category::Mentions,
            }]
        );
        assert!(feed.has_more());
        assert_eq!(feed.page(), 1);
        assert_eq!(feed.phase(), FeedPhase::Populated { has_more: true });
    }

    #[test]
    fn short_second_page_exhausts_feed() {
        let source = ScriptedSource::with_pages(vec![page("a", 10), page("b", 4)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.reveal_last();
        assert_eq!(feed.page(), 2);
        assert_eq!(feed.phase(), FeedPhase::LoadingMore);
        feed.settle();

        assert_eq!(feed.items().len(), 14);
        assert!(!feed.has_more());
        assert_eq!(ids(&feed)[..2], ["a0", "a1"]);
        assert_eq!(ids(&feed)[10..], ["b0", "b1", "b2", "b3"]);

        feed.reveal_last();
        feed.report_visibility("b3", false);
        feed.report_visibility("b3", true);
        feed.settle();
        assert_eq!(source.requests().len(), 2);
        assert_eq!(feed.page(), 2);
        assert_eq!(feed.phase(), FeedPhase::Populated { has_more: false });
    }

    #[test]
    fn intersections_during_a_fetch_are_ignored() {
        let source = ScriptedSource::with_pages(vec![page("a", 10), page("b", 10)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.reveal_last();
        for _ in 0..5 {
            feed.on_intersect();
            feed.reveal_last();
            feed.report_visibility("a9", false);
            feed.report_visibility("a9", true);
        }
        feed.settle();

        let pages: Vec<u32> = source.requests().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2]);
        assert_eq!(feed.items().len(), 20);
    }

    #[test]
    fn empty_first_page_shows_empty_state() {
        let source = ScriptedSource::with_pages(vec![Ok(NotificationPage::default())]);
        let mut feed = mounted(&source, Category::Following);
        feed.settle();

        assert_eq!(feed.phase(), FeedPhase::Empty);
        assert!(!feed.has_more());
        feed.reveal_last();
        assert_eq!(source.requests().len(), 1);
    }

    #[test]
    fn failed_first_page_is_recoverable() {
        let source = ScriptedSource::with_pages(vec![
            Err(ApiError::Rejected("boom".into())),
            page("a", 3),
        ]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        assert!(!feed.is_loading());
        assert!(feed.items().is_empty());
        assert_eq!(feed.phase(), FeedPhase::Failed);
        assert_eq!(feed.last_error(), Some("boom"));
        assert_eq!(feed.take_notices(), vec!["Failed to load notifications"]);
        assert!(feed.take_notices().is_empty());

        feed.retry();
        feed.settle();
        let pages: Vec<u32> = source.requests().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 1]);
        assert_eq!(feed.items().len(), 3);
        assert_eq!(feed.last_error(), None);
        assert_eq!(feed.phase(), FeedPhase::Populated { has_more: false });
    }

    #[test]
    fn failed_later_page_is_retried_not_skipped() {
        let source = ScriptedSource::with_pages(vec![
            page("a", 10),
            Err(ApiError::Rejected("timeout".into())),
            page("b", 10),
        ]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();
        feed.reveal_last();
        feed.settle();

        assert_eq!(feed.phase(), FeedPhase::Stalled);
        assert_eq!(feed.page(), 2);
        assert_eq!(feed.items().len(), 10);

        // Still in view: no automatic retry.
        feed.reveal_last();
        assert_eq!(source.requests().len(), 2);

        feed.report_visibility("a9", false);
        feed.report_visibility("a9", true);
        feed.settle();

        let pages: Vec<u32> = source.requests().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2, 2]);
        assert_eq!(feed.page(), 2);
        assert_eq!(feed.items().len(), 20);
    }

    #[test]
    fn overlapping_pages_do_not_duplicate_records() {
        let overlap = Ok(["a8", "a9", "b0", "b1", "b2", "b3", "b4", "b5", "b6", "b7"]
            .into_iter()
            .map(record)
            .collect::<Vec<_>>()
            .into());
        let source = ScriptedSource::with_pages(vec![page("a", 10), overlap]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();
        feed.reveal_last();
        feed.settle();

        assert_eq!(feed.items().len(), 18);
        assert!(feed.has_more());
        let unique: HashSet<&str> = ids(&feed).into_iter().collect();
        assert_eq!(unique.len(), 18);
    }

    #[test]
    fn reset_discards_the_in_flight_page() {
        let source = Arc::new(ScriptedSource {
            echo: Some(3),
            ..ScriptedSource::default()
        });
        let mut feed = mounted(&source, Category::All);
        feed.initialize(Category::Mentions);
        feed.settle();

        assert_eq!(feed.category(), Category::Mentions);
        assert_eq!(ids(&feed), vec!["Mentions-1-0", "Mentions-1-1", "Mentions-1-2"]);
    }

    #[test]
    fn dropping_a_loading_feed_discards_its_page() {
        let source = ScriptedSource::with_pages(vec![page("a", 10)]);
        let feed = mounted(&source, Category::All);
        drop(feed);

        let deadline = Instant::now() + WAIT;
        while source.requests().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(source.requests().len(), 1);

        let mut remounted = mounted(&source, Category::All);
        remounted.settle();
        assert_eq!(source.requests().len(), 2);
        assert_eq!(remounted.phase(), FeedPhase::Empty);
    }

    #[test]
    fn page_with_skipped_records_still_counts_as_full() {
        let partial = NotificationPage {
            records: (0..9).map(|n| record(&format!("a{n}"))).collect(),
            returned: DEFAULT_PAGE_SIZE,
        };
        let source = ScriptedSource::with_pages(vec![Ok(partial)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        assert_eq!(feed.items().len(), 9);
        assert!(feed.has_more());
        assert_eq!(feed.phase(), FeedPhase::Populated { has_more: true });
    }

    #[test]
    fn page_of_duplicates_rearms_the_last_card() {
        let source = ScriptedSource::with_pages(vec![page("a", 10), page("a", 10), page("b", 4)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.reveal_last();
        feed.settle();
        assert_eq!(feed.items().len(), 10);
        assert!(feed.has_more());

        // The last card never left the viewport.
        feed.reveal_last();
        feed.settle();

        let pages: Vec<u32> = source.requests().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert_eq!(feed.items().len(), 14);
        assert!(!feed.has_more());
    }

    #[test]
    fn mark_as_read_touches_only_the_matching_record() {
        let source = ScriptedSource::with_pages(vec![page("a", 3)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.mark_as_read("a1");
        let flags: Vec<bool> = feed.items().iter().map(|item| item.is_read).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(ids(&feed), vec!["a0", "a1", "a2"]);
        assert_eq!(feed.unread_count(), 2);

        feed.mark_as_read("missing");
        feed.settle();
        assert_eq!(feed.unread_count(), 2);
        assert_eq!(source.actions(), vec![FeedMutation::MarkRead("a1".into())]);
    }

    #[test]
    fn delete_removes_exactly_one_record() {
        let source = ScriptedSource::with_pages(vec![page("a", 4)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.delete_item("a2");
        assert_eq!(ids(&feed), vec!["a0", "a1", "a3"]);
        feed.delete_item("a2");
        assert_eq!(ids(&feed), vec!["a0", "a1", "a3"]);

        feed.settle();
        assert_eq!(source.actions(), vec![FeedMutation::Delete("a2".into())]);
    }

    #[test]
    fn demote_flags_the_record() {
        let source = ScriptedSource::with_pages(vec![page("a", 2)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.demote_item("a0");
        assert!(feed.items()[0].demoted);
        assert!(!feed.items()[1].demoted);
    }

    #[test]
    fn failed_remote_update_keeps_local_change_and_notifies() {
        let source = Arc::new(ScriptedSource {
            pages: Mutex::new(vec![page("a", 2)].into()),
            fail_actions: true,
            ..ScriptedSource::default()
        });
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.mark_as_read("a0");
        feed.settle();
        assert!(feed.items()[0].is_read);
        assert_eq!(feed.take_notices(), vec!["Couldn't mark as read: nope"]);
    }

    #[test]
    fn mutations_propagate_to_other_feeds() {
        let bus = MutationBus::default();
        let first_source = ScriptedSource::with_pages(vec![page("x", 3)]);
        let second_source = ScriptedSource::with_pages(vec![page("x", 3)]);
        let mut first = mounted_on(&first_source, Category::All, bus.clone());
        let mut second = mounted_on(&second_source, Category::Mentions, bus);
        first.settle();
        second.settle();

        first.mark_as_read("x1");
        first.delete_item("x0");
        second.poll();

        assert!(second.items().iter().any(|item| item.id == "x1" && item.is_read));
        assert_eq!(ids(&second), vec!["x1", "x2"]);

        first.settle();
        assert_eq!(ids(&first), vec!["x1", "x2"]);
        assert!(second_source.actions().is_empty());
    }

    #[test]
    fn only_the_last_record_can_be_observed() {
        let source = ScriptedSource::with_pages(vec![page("a", 10), page("b", 10)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();

        feed.observe_last_item("a3");
        feed.report_visibility("a3", true);
        assert_eq!(feed.sentinel.target(), None);
        assert_eq!(source.requests().len(), 1);

        feed.observe_last_item("a9");
        assert_eq!(feed.sentinel.target(), Some("a9"));
    }

    #[test]
    fn sentinel_retargets_and_fires_on_entry() {
        let mut sentinel = Sentinel::default();
        sentinel.attach("a");
        assert!(!sentinel.observe("a", false));
        assert!(sentinel.observe("a", true));
        assert!(!sentinel.observe("a", true));

        sentinel.attach("a");
        assert!(!sentinel.observe("a", true));

        sentinel.attach("b");
        assert!(!sentinel.observe("a", false));
        assert!(!sentinel.observe("a", true));
        assert!(sentinel.observe("b", true));

        sentinel.detach();
        assert_eq!(sentinel.target(), None);
        assert!(!sentinel.observe("b", true));
    }

    #[test]
    fn cards_mark_first_last_and_unread() {
        let source = ScriptedSource::with_pages(vec![page("a", 3)]);
        let mut feed = mounted(&source, Category::All);
        feed.settle();
        feed.mark_as_read("a2");

        let cards = feed.cards(Utc::now());
        let flags: Vec<(bool, bool, bool)> = cards
            .iter()
            .map(|card| (card.is_first, card.is_last, card.is_unread))
            .collect();
        assert_eq!(
            flags,
            vec![(true, false, true), (false, false, true), (false, true, false)]
        );
    }
}
