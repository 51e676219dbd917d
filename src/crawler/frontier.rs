//! Breadth-first crawl frontier
//!
//! The frontier owns every scheduling decision of a crawl run: which URLs are
//! admitted, in what order they are released for fetching, and when the page
//! budget is spent. It is owned by a single driver, so the visited-set check
//! and insert happen together and no URL is ever queued twice.

use crate::state::TaskStatus;
use crate::url::same_origin;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// One URL admitted to a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,

    /// Link distance from the seed, fixed at first discovery
    pub depth: u32,

    /// Page the URL was first discovered on; none for the seed
    pub parent: Option<Url>,

    pub status: TaskStatus,
}

/// Result of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Queued for fetching
    Scheduled,
    /// Already queued, in flight or finished in this run
    AlreadySeen,
    /// Beyond the maximum depth
    TooDeep,
    /// Different origin from the seed
    CrossOrigin,
    /// The page budget is already spent
    BudgetExhausted,
}

/// Visited set, FIFO queue and budget accounting for one crawl run
#[derive(Debug)]
pub struct CrawlFrontier {
    seed: Url,
    max_depth: u32,
    max_pages: u32,
    visited: HashSet<String>,
    queue: VecDeque<CrawlTask>,

    /// Pages fetched, written and counted against the budget
    accepted: u32,

    /// Tasks released and not yet completed
    in_flight: u32,

    /// Depth of the tasks currently in flight
    in_flight_level: Option<u32>,
}

impl CrawlFrontier {
    /// Creates a frontier holding only the seed at depth 0
    pub fn new(seed: Url, max_depth: u32, max_pages: u32) -> Self {
        let mut frontier = Self {
            seed: seed.clone(),
            max_depth,
            max_pages,
            visited: HashSet::new(),
            queue: VecDeque::new(),
            accepted: 0,
            in_flight: 0,
            in_flight_level: None,
        };
        frontier.admit(seed, 0, None);
        frontier
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Offers a discovered URL for scheduling
    ///
    /// The URL is queued only if it is new to this run, within the maximum
    /// depth, on the seed's origin and the budget is not yet spent.
    pub fn admit(&mut self, url: Url, depth: u32, parent: Option<&Url>) -> Admission {
        if self.visited.contains(url.as_str()) {
            return Admission::AlreadySeen;
        }
        if depth > self.max_depth {
            return Admission::TooDeep;
        }
        if !same_origin(&self.seed, &url) {
            return Admission::CrossOrigin;
        }
        if self.budget_exhausted() {
            return Admission::BudgetExhausted;
        }

        self.visited.insert(url.as_str().to_string());
        self.queue.push_back(CrawlTask {
            url,
            depth,
            parent: parent.cloned(),
            status: TaskStatus::Pending,
        });
        Admission::Scheduled
    }

    /// Releases the next task for fetching
    ///
    /// Returns None when nothing may start right now: the queue is empty, the
    /// accepted plus in-flight pages already cover the budget, or the next task
    /// is one level deeper than tasks still in flight. Holding back the deeper
    /// level keeps the order strictly breadth-first under concurrency.
    pub fn next_task(&mut self) -> Option<CrawlTask> {
        if self.accepted + self.in_flight >= self.max_pages {
            return None;
        }

        let front_depth = self.queue.front()?.depth;
        if self.in_flight > 0 && self.in_flight_level != Some(front_depth) {
            return None;
        }

        let task = self.queue.pop_front()?;
        self.in_flight += 1;
        self.in_flight_level = Some(task.depth);
        Some(task)
    }

    /// Completes an in-flight task whose page was accepted
    ///
    /// Returns false, without counting the page, if the budget was already
    /// spent.
    pub fn complete_accepted(&mut self) -> bool {
        self.release_slot();
        if self.budget_exhausted() {
            return false;
        }
        self.accepted += 1;
        true
    }

    /// Completes an in-flight task that produced no page
    pub fn complete_rejected(&mut self) {
        self.release_slot();
    }

    /// Removes every task still queued, for reporting at the end of a run
    pub fn drain_pending(&mut self) -> Vec<CrawlTask> {
        self.queue.drain(..).collect()
    }

    pub fn budget_exhausted(&self) -> bool {
        self.accepted >= self.max_pages
    }

    /// True once nothing is in flight and nothing more can be released
    pub fn is_finished(&self) -> bool {
        self.in_flight == 0 && (self.queue.is_empty() || self.budget_exhausted())
    }

    pub fn accepted(&self) -> u32 {
        self.accepted
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Iterates over queued tasks in release order
    pub fn queued(&self) -> impl Iterator<Item = &CrawlTask> {
        self.queue.iter()
    }

    fn release_slot(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.in_flight_level = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://example.org/").unwrap().join(path).unwrap()
    }

    fn frontier(max_depth: u32, max_pages: u32) -> CrawlFrontier {
        CrawlFrontier::new(url("/"), max_depth, max_pages)
    }

    #[test]
    fn test_seed_is_queued_at_depth_zero() {
        let mut frontier = frontier(2, 10);
        assert_eq!(frontier.pending(), 1);

        let task = frontier.next_task().unwrap();
        assert_eq!(task.url, url("/"));
        assert_eq!(task.depth, 0);
        assert!(task.parent.is_none());
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_admission_checks() {
        let mut frontier = frontier(1, 10);
        let seed = url("/");

        assert_eq!(frontier.admit(url("/a"), 1, Some(&seed)), Admission::Scheduled);
        assert_eq!(frontier.admit(url("/a"), 1, Some(&seed)), Admission::AlreadySeen);
        assert_eq!(frontier.admit(seed.clone(), 1, Some(&seed)), Admission::AlreadySeen);
        assert_eq!(frontier.admit(url("/b"), 2, Some(&seed)), Admission::TooDeep);
        assert_eq!(
            frontier.admit(Url::parse("https://other.org/").unwrap(), 1, Some(&seed)),
            Admission::CrossOrigin
        );
        assert_eq!(
            frontier.admit(Url::parse("http://example.org/a").unwrap(), 1, Some(&seed)),
            Admission::CrossOrigin
        );
        assert_eq!(frontier.pending(), 2);
    }

    #[test]
    fn test_depth_fixed_at_first_encounter() {
        let mut frontier = frontier(3, 10);
        let seed = url("/");
        frontier.next_task();
        frontier.complete_accepted();

        assert_eq!(frontier.admit(url("/a"), 1, Some(&seed)), Admission::Scheduled);
        // later discovery from a deeper page does not change the depth
        assert_eq!(frontier.admit(url("/a"), 2, Some(&url("/b"))), Admission::AlreadySeen);

        let task = frontier.next_task().unwrap();
        assert_eq!(task.depth, 1);
        assert_eq!(task.parent, Some(seed));
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = frontier(2, 10);
        let seed = url("/");
        frontier.next_task();
        frontier.complete_accepted();

        for path in ["/c", "/a", "/b"] {
            frontier.admit(url(path), 1, Some(&seed));
        }

        let order: Vec<_> = std::iter::from_fn(|| {
            let task = frontier.next_task()?;
            frontier.complete_accepted();
            Some(task.url.path().to_string())
        })
        .collect();
        assert_eq!(order, vec!["/c", "/a", "/b"]);
    }

    #[test]
    fn test_budget_caps_releases() {
        let mut frontier = frontier(2, 2);
        let seed = url("/");
        frontier.next_task();

        for path in ["/a", "/b", "/c"] {
            frontier.admit(url(path), 1, Some(&seed));
        }
        assert!(frontier.complete_accepted());

        // one slot left: only one more task may be in flight
        assert!(frontier.next_task().is_some());
        assert!(frontier.next_task().is_none());

        // a failure frees the slot again
        frontier.complete_rejected();
        assert!(frontier.next_task().is_some());
        assert!(frontier.complete_accepted());

        assert!(frontier.budget_exhausted());
        assert!(frontier.next_task().is_none());
        assert_eq!(frontier.admit(url("/d"), 1, Some(&seed)), Admission::BudgetExhausted);
        assert!(frontier.is_finished());
        assert_eq!(frontier.drain_pending().len(), 1);
    }

    #[test]
    fn test_deeper_level_waits_for_in_flight_level() {
        let mut frontier = frontier(3, 10);
        let seed = url("/");
        frontier.next_task();
        frontier.complete_accepted();

        frontier.admit(url("/a"), 1, Some(&seed));
        frontier.admit(url("/b"), 1, Some(&seed));

        let a = frontier.next_task().unwrap();
        let b = frontier.next_task().unwrap();
        assert_eq!((a.depth, b.depth), (1, 1));

        // /a finishes first and discovers a depth-2 page while /b is still in flight
        frontier.complete_accepted();
        frontier.admit(url("/a/child"), 2, Some(&a.url));
        assert!(frontier.next_task().is_none());

        frontier.complete_accepted();
        let child = frontier.next_task().unwrap();
        assert_eq!(child.depth, 2);
    }

    #[test]
    fn test_finished_when_queue_empty() {
        let mut frontier = frontier(0, 10);
        assert!(!frontier.is_finished());
        frontier.next_task();
        assert!(!frontier.is_finished());
        frontier.complete_rejected();
        assert!(frontier.is_finished());
        assert_eq!(frontier.accepted(), 0);
    }
}
