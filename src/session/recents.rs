//! Recently viewed tickers, kept per session

use super::WatcherSession;
use serde::{Deserialize, Serialize};

/// Longest list a session keeps
pub const MAX_RECENTS: usize = 5;

/// A viewed ticker, compared by value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewPair {
    pub symbol: String,
    pub exchange_acronym: String,
}

impl ViewPair {
    pub fn new(symbol: impl Into<String>, exchange_acronym: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange_acronym: exchange_acronym.into(),
        }
    }
}

/// Unique pairs, oldest first, at most `MAX_RECENTS` long
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recents(Vec<ViewPair>);

impl Recents {
    pub fn as_slice(&self) -> &[ViewPair] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, pair: &ViewPair) -> bool {
        self.0.contains(pair)
    }

    /// Append `pair` unless already present. Returns whether the list changed.
    ///
    /// A pair already in the list keeps its position. A full list drops its
    /// oldest entries so the result is never longer than `MAX_RECENTS`.
    pub fn add(&mut self, pair: ViewPair) -> bool {
        if self.contains(&pair) {
            return false;
        }

        if self.0.len() >= MAX_RECENTS {
            let excess = self.0.len() - (MAX_RECENTS - 1);
            self.0.drain(..excess);
        }
        self.0.push(pair);
        true
    }
}

impl From<Vec<ViewPair>> for Recents {
    fn from(pairs: Vec<ViewPair>) -> Self {
        let mut recents = Recents::default();
        for pair in pairs {
            recents.add(pair);
        }
        recents
    }
}

/// Current list for the session; empty when nothing was recorded
pub fn get_recents(session: &WatcherSession) -> Vec<ViewPair> {
    session.recents.as_slice().to_vec()
}

/// Record a view of `symbol` on `exchange_acronym` and return the updated list
pub fn add_to_recents(
    session: &mut WatcherSession,
    symbol: &str,
    exchange_acronym: &str,
) -> Vec<ViewPair> {
    if session.recents.add(ViewPair::new(symbol, exchange_acronym)) {
        tracing::debug!("Added {}/{} to recents", symbol, exchange_acronym);
    }
    get_recents(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(symbol: &str) -> ViewPair {
        ViewPair::new(symbol, "NASDAQ")
    }

    fn session_with(symbols: &[&str]) -> WatcherSession {
        let mut session = WatcherSession::default();
        for symbol in symbols {
            add_to_recents(&mut session, symbol, "NASDAQ");
        }
        session
    }

    #[test]
    fn test_empty_session_has_no_recents() {
        assert!(get_recents(&WatcherSession::default()).is_empty());
    }

    #[test]
    fn test_length_never_exceeds_max() {
        let mut session = WatcherSession::default();
        for i in 0..50 {
            let symbol = format!("T{}", i % 9);
            let recents = add_to_recents(&mut session, &symbol, "NYSE");
            assert!(recents.len() <= MAX_RECENTS);
        }
    }

    #[test]
    fn test_readding_present_pair_is_unchanged() {
        let mut session = session_with(&["AAPL", "MSFT", "NVDA"]);
        let before = serde_json::to_string(&session.recents).unwrap();

        let after = add_to_recents(&mut session, "MSFT", "NASDAQ");

        assert_eq!(after, vec![pair("AAPL"), pair("MSFT"), pair("NVDA")]);
        assert_eq!(serde_json::to_string(&session.recents).unwrap(), before);
    }

    #[test]
    fn test_sixth_pair_drops_oldest() {
        let mut session = session_with(&["A", "B", "C", "D", "E"]);
        let recents = add_to_recents(&mut session, "F", "NASDAQ");
        assert_eq!(
            recents,
            vec![pair("B"), pair("C"), pair("D"), pair("E"), pair("F")]
        );
    }

    #[test]
    fn test_aapl_then_msft() {
        let mut session = session_with(&["AAPL"]);

        let unchanged = add_to_recents(&mut session, "AAPL", "NASDAQ");
        assert_eq!(unchanged, vec![pair("AAPL")]);

        let added = add_to_recents(&mut session, "MSFT", "NASDAQ");
        assert_eq!(added, vec![pair("AAPL"), pair("MSFT")]);
    }

    #[test]
    fn test_same_symbol_on_other_exchange_is_distinct() {
        let mut session = session_with(&["SHOP"]);
        let recents = add_to_recents(&mut session, "SHOP", "NYSE");
        assert_eq!(recents.len(), 2);
    }

    #[test]
    fn test_oversized_stored_list_is_trimmed_on_add() {
        // A list written by an older build may already exceed the cap
        let mut session = WatcherSession::default();
        session.recents = serde_json::from_str(
            r#"[{"symbol":"A","exchange_acronym":"X"},{"symbol":"B","exchange_acronym":"X"},
                {"symbol":"C","exchange_acronym":"X"},{"symbol":"D","exchange_acronym":"X"},
                {"symbol":"E","exchange_acronym":"X"},{"symbol":"F","exchange_acronym":"X"},
                {"symbol":"G","exchange_acronym":"X"}]"#,
        )
        .unwrap();

        let recents = add_to_recents(&mut session, "H", "X");
        let symbols: Vec<_> = recents.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["D", "E", "F", "G", "H"]);
    }
}
