// Tolerance band pattern matcher
// Votes over the labelled history: a stored sample supports a label when
// every matched field lies within its configured tolerance of the query

use std::collections::HashMap;

use crate::config::MatcherConfig;
use crate::signal::{EegSample, EventKind};

/// A matcher result: the winning label and how many history entries voted
/// for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchVote {
    pub event: EventKind,
    pub votes: usize,
}

/// Match a query sample against the labelled history.
///
/// A stored sample matches when, for every field with a non-zero tolerance,
/// `|stored - query| <= tolerance`. Zero-tolerance fields are skipped
/// entirely (not required to be equal); this is a band matcher, not a
/// nearest-neighbor ranking.
///
/// Scan policy: the whole history, newest entry first. The label with the
/// most matching entries wins, provided its count reaches `multi_count`;
/// when two labels tie on votes the one whose newest matching sample was
/// appended most recently wins.
///
/// Pure function of its inputs; no hidden state.
pub fn match_event(
    history: &[EegSample],
    query: &EegSample,
    config: &MatcherConfig,
) -> Option<MatchVote> {
    if history.is_empty() {
        return None;
    }

    let tolerances = config.tolerances.as_array();

    // votes per label, plus the newest-first scan position of the first
    // (most recent) match for tie-breaking
    let mut votes: HashMap<EventKind, (usize, usize)> = HashMap::new();

    for (recency, stored) in history.iter().rev().enumerate() {
        let Some(label) = stored.event_name else {
            continue;
        };
        if within_tolerances(stored, query, &tolerances) {
            let entry = votes.entry(label).or_insert((0, recency));
            entry.0 += 1;
        }
    }

    if log::log_enabled!(log::Level::Debug) {
        let summary: Vec<String> = EventKind::ALL
            .iter()
            .map(|k| format!("{}: {}", k.as_str(), votes.get(k).map_or(0, |v| v.0)))
            .collect();
        log::debug!("Matcher votes: {}", summary.join(", "));
    }

    // Highest vote count wins; on a tie, the smaller first-match recency
    // index (i.e. the more recently appended matching sample) wins
    let (event, (count, _)) = votes
        .into_iter()
        .max_by(|(_, (ca, ra)), (_, (cb, rb))| ca.cmp(cb).then(rb.cmp(ra)))?;

    if count >= config.multi_count {
        Some(MatchVote { event, votes: count })
    } else {
        None
    }
}

fn within_tolerances(stored: &EegSample, query: &EegSample, tolerances: &[i32; 10]) -> bool {
    let stored_fields = stored.matched_fields();
    let query_fields = query.matched_fields();

    for i in 0..tolerances.len() {
        let t = tolerances[i];
        if t == 0 {
            continue;
        }
        if (stored_fields[i] - query_fields[i]).abs() > t {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tolerances;

    fn sample(attention: i32, label: Option<EventKind>) -> EegSample {
        let mut s = EegSample::new(attention, 50, 0, [100; 8]);
        s.event_name = label;
        s
    }

    fn attention_only(tolerance: i32, multi_count: usize) -> MatcherConfig {
        MatcherConfig {
            tolerances: Tolerances {
                attention: tolerance,
                meditation: 0,
                delta: 0,
                theta: 0,
                low_alpha: 0,
                high_alpha: 0,
                low_beta: 0,
                high_beta: 0,
                low_gamma: 0,
                high_gamma: 0,
            },
            multi_count,
        }
    }

    #[test]
    fn test_empty_history_returns_none() {
        let query = sample(50, None);
        let config = attention_only(10, 1);
        assert_eq!(match_event(&[], &query, &config), None);
    }

    #[test]
    fn test_within_band_matches() {
        let history = vec![sample(55, Some(EventKind::MoveLeft))];
        let query = sample(50, None);
        let config = attention_only(5, 1);

        let vote = match_event(&history, &query, &config).unwrap();
        assert_eq!(vote.event, EventKind::MoveLeft);
        assert_eq!(vote.votes, 1);
    }

    #[test]
    fn test_outside_band_does_not_match() {
        let history = vec![sample(56, Some(EventKind::MoveLeft))];
        let query = sample(50, None);
        let config = attention_only(5, 1);

        assert_eq!(match_event(&history, &query, &config), None);
    }

    #[test]
    fn test_zero_tolerance_skips_field() {
        // Attention differs wildly, but its tolerance is zero so the field
        // is ignored; meditation is the only active band
        let mut stored = sample(90, Some(EventKind::Stop));
        stored.meditation = 52;
        let mut query = sample(10, None);
        query.meditation = 50;

        let mut config = attention_only(0, 1);
        config.tolerances.meditation = 5;

        let vote = match_event(&[stored], &query, &config).unwrap();
        assert_eq!(vote.event, EventKind::Stop);
    }

    #[test]
    fn test_vote_threshold() {
        let history = vec![
            sample(50, Some(EventKind::MoveUp)),
            sample(51, Some(EventKind::MoveUp)),
        ];
        let query = sample(50, None);

        // Two matching entries, threshold three
        let config = attention_only(5, 3);
        assert_eq!(match_event(&history, &query, &config), None);

        // Threshold two passes
        let config = attention_only(5, 2);
        let vote = match_event(&history, &query, &config).unwrap();
        assert_eq!(vote.votes, 2);
    }

    #[test]
    fn test_spec_scenario_twelve_ml_eleven_mr() {
        // 12 ml entries, 8 of them in band; 11 mr entries, 2 in band.
        // Vote threshold 5 -> (ml, 8).
        let mut history = Vec::new();
        for i in 0..12 {
            let attention = if i < 8 { 50 } else { 90 };
            history.push(sample(attention, Some(EventKind::MoveLeft)));
        }
        for i in 0..11 {
            let attention = if i < 2 { 52 } else { 95 };
            history.push(sample(attention, Some(EventKind::MoveRight)));
        }

        let query = sample(50, None);
        let config = attention_only(5, 5);

        let vote = match_event(&history, &query, &config).unwrap();
        assert_eq!(vote.event, EventKind::MoveLeft);
        assert_eq!(vote.votes, 8);
    }

    #[test]
    fn test_tie_broken_by_most_recent_match() {
        // Equal vote counts; mr's matching sample was appended last
        let history = vec![
            sample(50, Some(EventKind::MoveLeft)),
            sample(50, Some(EventKind::MoveRight)),
        ];
        let query = sample(50, None);
        let config = attention_only(5, 1);

        let vote = match_event(&history, &query, &config).unwrap();
        assert_eq!(vote.event, EventKind::MoveRight);
        assert_eq!(vote.votes, 1);
    }

    #[test]
    fn test_vote_counts_match_exhaustive_oracle() {
        // Random-ish history across labels and values; the reported vote
        // count must equal a brute-force re-count
        let labels = [
            EventKind::MoveLeft,
            EventKind::MoveRight,
            EventKind::Stop,
        ];
        let mut history = Vec::new();
        for i in 0..60 {
            let mut s = sample((i * 7) % 100, Some(labels[(i % 3) as usize]));
            s.meditation = (i * 13) % 100;
            history.push(s);
        }

        let mut query = sample(47, None);
        query.meditation = 40;

        let mut config = attention_only(12, 1);
        config.tolerances.meditation = 25;

        let tolerances = config.tolerances.as_array();
        let oracle = |label: EventKind| {
            history
                .iter()
                .filter(|s| s.event_name == Some(label))
                .filter(|s| super::within_tolerances(s, &query, &tolerances))
                .count()
        };

        if let Some(vote) = match_event(&history, &query, &config) {
            assert_eq!(vote.votes, oracle(vote.event));
            // And no other label beats it
            for label in labels {
                assert!(oracle(label) <= vote.votes);
            }
        } else {
            for label in labels {
                assert_eq!(oracle(label), 0);
            }
        }
    }
}
