//! Historical interaction dataset and the profile derived from it.
//!
//! The dataset is a CSV file with the header
//! `session_id,timestamp_ms,event_type,element_id,value`. The value column is
//! last so typed text may contain commas.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::error::{Result, SimError};
use crate::types::{EventType, InteractionValue, UserInteraction};

const HEADER: [&str; 5] = ["session_id", "timestamp_ms", "event_type", "element_id", "value"];

/// One past interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub session_id: String,
    pub timestamp_ms: u64,
    pub interaction: UserInteraction,
}

/// Parsed historical dataset. Never empty.
#[derive(Debug, Clone)]
pub struct InteractionHistory {
    rows: Vec<HistoryRow>,
}

impl InteractionHistory {
    pub fn from_rows(rows: Vec<HistoryRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(SimError::DataUnavailable("dataset has no rows".to_string()));
        }
        Ok(Self { rows })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            SimError::DataUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let history = Self::parse_csv(&text)?;
        info!(path = %path.display(), rows = history.rows.len(), "Loaded interaction history");
        Ok(history)
    }

    pub fn parse_csv(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| SimError::DataUnavailable("dataset is empty".to_string()))?;
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        if columns != HEADER {
            return Err(SimError::DataUnavailable(format!(
                "unexpected header '{header}', expected '{}'",
                HEADER.join(",")
            )));
        }

        let rows = lines
            .map(|(i, line)| parse_row(line).map_err(|e| malformed(i + 1, &e)))
            .collect::<Result<Vec<_>>>()?;

        Self::from_rows(rows)
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    /// Rows grouped by session in order of first appearance, each session
    /// ordered by timestamp.
    pub fn sessions(&self) -> Vec<Vec<&HistoryRow>> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut sessions: Vec<Vec<&HistoryRow>> = Vec::new();
        for row in &self.rows {
            let slot = *index.entry(row.session_id.as_str()).or_insert_with(|| {
                sessions.push(Vec::new());
                sessions.len() - 1
            });
            sessions[slot].push(row);
        }
        for session in &mut sessions {
            session.sort_by_key(|r| r.timestamp_ms);
        }
        sessions
    }

    pub fn profile(&self) -> HistoryProfile {
        HistoryProfile::build(self)
    }
}

fn malformed(line: usize, reason: &str) -> SimError {
    SimError::DataUnavailable(format!("line {line}: {reason}"))
}

fn parse_row(line: &str) -> std::result::Result<HistoryRow, String> {
    let fields: Vec<&str> = line.splitn(5, ',').collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 columns, found {}", fields.len()));
    }

    let session_id = fields[0].trim().to_string();
    let timestamp_ms: u64 = fields[1]
        .trim()
        .parse()
        .map_err(|_| format!("invalid timestamp '{}'", fields[1]))?;
    let event_type: EventType = fields[2].parse()?;
    let element_id = fields[3].trim();
    if element_id.is_empty() {
        return Err("empty element_id".to_string());
    }

    let raw = fields[4];
    let value = if raw.trim().is_empty() {
        None
    } else if event_type == EventType::Scroll {
        let offset = raw
            .trim()
            .parse()
            .map_err(|_| format!("scroll offset '{raw}' is not an integer"))?;
        Some(InteractionValue::Offset(offset))
    } else {
        Some(InteractionValue::Text(raw.to_string()))
    };

    Ok(HistoryRow {
        session_id,
        timestamp_ms,
        interaction: UserInteraction::new(event_type, element_id, value),
    })
}

/// Where the generator gets its history from.
#[derive(Debug, Clone)]
pub enum HistorySource {
    Path(PathBuf),
    Loaded(Arc<InteractionHistory>),
}

impl HistorySource {
    pub async fn load(&self) -> Result<Arc<InteractionHistory>> {
        match self {
            HistorySource::Path(path) => Ok(Arc::new(InteractionHistory::load(path).await?)),
            HistorySource::Loaded(history) => Ok(history.clone()),
        }
    }
}

/// Preprocessed view of a history: element frequencies, last seen values and
/// normalization statistics.
#[derive(Debug, Clone, Default)]
pub struct HistoryProfile {
    type_counts: [usize; EventType::COUNT],
    elements_by_type: BTreeMap<EventType, BTreeMap<String, usize>>,
    elements: BTreeMap<String, usize>,
    last_values: BTreeMap<(EventType, String), InteractionValue>,
    scroll_sum: u128,
    scroll_count: usize,
    scroll_max: u64,
    text_len_sum: usize,
    text_count: usize,
    text_len_max: usize,
}

impl HistoryProfile {
    fn build(history: &InteractionHistory) -> Self {
        let mut profile = Self::default();
        for row in history.rows() {
            let i = &row.interaction;
            let t = i.event_type();
            profile.type_counts[t.index()] += 1;
            *profile
                .elements_by_type
                .entry(t)
                .or_default()
                .entry(i.element_id().to_string())
                .or_default() += 1;
            *profile
                .elements
                .entry(i.element_id().to_string())
                .or_default() += 1;

            match i.value() {
                Some(InteractionValue::Offset(n)) => {
                    let magnitude = n.unsigned_abs();
                    profile.scroll_sum += u128::from(magnitude);
                    profile.scroll_count += 1;
                    profile.scroll_max = profile.scroll_max.max(magnitude);
                }
                Some(InteractionValue::Text(s)) => {
                    let len = s.chars().count();
                    profile.text_len_sum += len;
                    profile.text_count += 1;
                    profile.text_len_max = profile.text_len_max.max(len);
                }
                None => {}
            }
            if let Some(v) = i.value() {
                profile
                    .last_values
                    .insert((t, i.element_id().to_string()), v.clone());
            }
        }
        profile
    }

    pub fn type_counts(&self) -> &[usize; EventType::COUNT] {
        &self.type_counts
    }

    /// Mean scroll magnitude relative to the largest one, in `[0, 1]`.
    pub fn scroll_feature(&self) -> f32 {
        if self.scroll_count == 0 || self.scroll_max == 0 {
            return 0.0;
        }
        let mean = self.scroll_sum as f64 / self.scroll_count as f64;
        // float rounding can push mean/max a hair past 1 at extreme offsets
        (mean / self.scroll_max as f64).clamp(0.0, 1.0) as f32
    }

    /// Mean typed length relative to the longest text, in `[0, 1]`.
    pub fn text_feature(&self) -> f32 {
        if self.text_count == 0 || self.text_len_max == 0 {
            return 0.0;
        }
        let mean = self.text_len_sum as f64 / self.text_count as f64;
        (mean / self.text_len_max as f64) as f32
    }

    /// Candidate elements for an event type with their frequencies, falling
    /// back to every known element when the type was never observed.
    fn candidates(&self, event_type: EventType) -> &BTreeMap<String, usize> {
        match self.elements_by_type.get(&event_type) {
            Some(map) if !map.is_empty() => map,
            _ => &self.elements,
        }
    }

    /// Most frequent element for the type; ties go to the smallest id.
    pub fn most_frequent_element(&self, event_type: EventType) -> Option<&str> {
        // BTreeMap iterates ascending, so keeping the first max breaks ties
        // toward the lexicographically smallest id.
        let mut best: Option<(&str, usize)> = None;
        for (id, &n) in self.candidates(event_type) {
            if best.map_or(true, |(_, b)| n > b) {
                best = Some((id.as_str(), n));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Element drawn with probability proportional to its frequency.
    pub fn sample_element<R: Rng>(&self, event_type: EventType, rng: &mut R) -> Option<&str> {
        let candidates = self.candidates(event_type);
        let total: usize = candidates.values().sum();
        if total == 0 {
            return None;
        }
        let mut pick = rng.random_range(0..total);
        for (id, &n) in candidates {
            if pick < n {
                return Some(id.as_str());
            }
            pick -= n;
        }
        None
    }

    pub fn last_value(&self, event_type: EventType, element_id: &str) -> Option<&InteractionValue> {
        self.last_values.get(&(event_type, element_id.to_string()))
    }

    /// Every known element with the event types observed on it.
    pub fn element_usage(&self) -> BTreeMap<&str, Vec<EventType>> {
        let mut usage: BTreeMap<&str, Vec<EventType>> = BTreeMap::new();
        for (t, elements) in &self.elements_by_type {
            for id in elements.keys() {
                usage.entry(id.as_str()).or_default().push(*t);
            }
        }
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SAMPLE: &str = "\
session_id,timestamp_ms,event_type,element_id,value
s1,100,click,btn1,
s1,200,scroll,panel1,120
s1,300,type,input1,hello, world
s2,50,click,btn2,
s2,10,hover,btn2,
s2,90,click,btn2,
";

    #[test]
    fn parses_rows_and_keeps_commas_in_text() {
        let history = InteractionHistory::parse_csv(SAMPLE).unwrap();
        assert_eq!(history.rows().len(), 6);
        assert_eq!(
            history.rows()[2].interaction,
            UserInteraction::typed("input1", "hello, world")
        );
        assert_eq!(history.rows()[1].interaction, UserInteraction::scroll("panel1", 120));
    }

    #[test]
    fn sessions_are_ordered_by_timestamp() {
        let history = InteractionHistory::parse_csv(SAMPLE).unwrap();
        let sessions = history.sessions();
        assert_eq!(sessions.len(), 2);
        let s2: Vec<EventType> = sessions[1]
            .iter()
            .map(|r| r.interaction.event_type())
            .collect();
        assert_eq!(s2, vec![EventType::Hover, EventType::Click, EventType::Click]);
    }

    #[test]
    fn header_only_dataset_is_unavailable() {
        let err = InteractionHistory::parse_csv(
            "session_id,timestamp_ms,event_type,element_id,value\n",
        )
        .unwrap_err();
        assert!(matches!(err, SimError::DataUnavailable(_)));
    }

    #[test]
    fn bad_row_reports_line_number() {
        let text = "session_id,timestamp_ms,event_type,element_id,value\ns1,1,drag,btn1,\n";
        let err = InteractionHistory::parse_csv(text).unwrap_err();
        assert_eq!(
            err,
            SimError::DataUnavailable("line 2: unknown event type 'drag'".to_string())
        );
    }

    #[test]
    fn wrong_header_is_unavailable() {
        let err = InteractionHistory::parse_csv("a,b,c\n1,2,3\n").unwrap_err();
        assert!(matches!(err, SimError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let err = InteractionHistory::load(Path::new("/nonexistent/user_interactions.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::DataUnavailable(_)));
    }

    #[test]
    fn most_frequent_element_breaks_ties_lexicographically() {
        let history = InteractionHistory::parse_csv(SAMPLE).unwrap();
        let profile = history.profile();
        assert_eq!(profile.most_frequent_element(EventType::Click), Some("btn2"));
        assert_eq!(profile.most_frequent_element(EventType::Scroll), Some("panel1"));
        // never observed: falls back to all elements, btn2 has 3 rows
        assert_eq!(profile.most_frequent_element(EventType::Submit), Some("btn2"));
    }

    #[test]
    fn sampling_only_returns_candidates_for_the_type() {
        let profile = InteractionHistory::parse_csv(SAMPLE).unwrap().profile();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let id = profile.sample_element(EventType::Click, &mut rng).unwrap();
            assert!(id == "btn1" || id == "btn2");
        }
    }

    #[test]
    fn normalization_features_stay_in_unit_range() {
        let profile = InteractionHistory::parse_csv(SAMPLE).unwrap().profile();
        assert!((profile.scroll_feature() - 1.0).abs() < f32::EPSILON);
        assert!((0.0..=1.0).contains(&profile.text_feature()));
    }

    #[test]
    fn extreme_scroll_offsets_do_not_overflow() {
        let history = InteractionHistory::parse_csv(
            "session_id,timestamp_ms,event_type,element_id,value
s1,1,scroll,feed,9000000000000000000
s1,2,scroll,feed,9000000000000000000
s1,3,scroll,feed,-9223372036854775808
",
        )
        .unwrap();
        let profile = history.profile();

        let scroll = profile.scroll_feature();
        assert!((0.0..=1.0).contains(&scroll), "scroll feature {scroll}");
        assert!(crate::features::encode_step(0, 3, None, &profile).is_ok());
    }

    #[test]
    fn last_value_tracks_type_and_element() {
        let profile = InteractionHistory::parse_csv(SAMPLE).unwrap().profile();
        assert_eq!(
            profile.last_value(EventType::Scroll, "panel1"),
            Some(&InteractionValue::Offset(120))
        );
        assert_eq!(profile.last_value(EventType::Click, "btn1"), None);
    }
}
