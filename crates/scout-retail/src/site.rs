use scout_core::{DealType, InventoryItem, Retailer, Store};
use scout_fetch::{Content, FetchTarget};

/// One deal listing page to fetch for a store.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub deal_type: DealType,
    pub target: FetchTarget,
}

/// Retailer-specific knowledge: which pages carry deals and how to read them.
///
/// Implementations are pure with respect to the network; the scrape driver in
/// [`crate::scraper`] owns fetching, rate limiting, and retry. That split
/// keeps the parsers testable against saved page fixtures.
pub trait RetailerSite: Send + Sync {
    /// Which retailer this site handles.
    fn retailer(&self) -> Retailer;

    /// Deal listing pages to fetch for the given store, in fetch order.
    fn listing_pages(&self, store: &Store) -> Vec<ListingPage>;

    /// Parse a fetched listing page into inventory items.
    ///
    /// Items come back in page-encountered order. Unparseable entries are
    /// skipped with a log line, never an error; an empty vec is a legitimate
    /// result for a store with no current deals.
    fn parse_listing(
        &self,
        content: &Content,
        deal_type: DealType,
        store: &Store,
    ) -> Vec<InventoryItem>;
}
