use crate::activity::ContributionEvent;
use chrono::NaiveDate;
use indexmap::IndexMap;

/// Number of push events per UTC calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributionCounter {
    counts: IndexMap<NaiveDate, u32>,
}

impl ContributionCounter {
    /// Creates an empty counter.
    pub fn new() -> ContributionCounter {
        ContributionCounter::default()
    }

    /// Counts push events by the date they happened on. Events of any other kind are ignored.
    pub fn from_events<I>(events: I) -> ContributionCounter
    where
        I: IntoIterator<Item = ContributionEvent>,
    {
        let mut counter = ContributionCounter::new();
        counter.extend(events);
        counter
    }

    /// Records a single contribution on `date`.
    pub fn add(&mut self, date: NaiveDate) {
        *self.counts.entry(date).or_default() += 1;
    }

    /// Number of contributions on `date`, zero if there were none.
    pub fn get(&self, date: NaiveDate) -> u32 {
        self.counts.get(&date).copied().unwrap_or_default()
    }

    /// Sum of all contributions.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|count| u64::from(*count)).sum()
    }

    /// Number of distinct days with at least one contribution.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates over days and their counts in the order they were first seen.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.counts.iter().map(|(date, count)| (*date, *count))
    }
}

impl Extend<ContributionEvent> for ContributionCounter {
    fn extend<I: IntoIterator<Item = ContributionEvent>>(&mut self, iter: I) {
        iter.into_iter()
            .filter(ContributionEvent::is_push)
            .for_each(|event| self.add(event.date()));
    }
}

impl FromIterator<ContributionEvent> for ContributionCounter {
    fn from_iter<I: IntoIterator<Item = ContributionEvent>>(iter: I) -> Self {
        ContributionCounter::from_events(iter)
    }
}

impl FromIterator<(NaiveDate, u32)> for ContributionCounter {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, u32)>>(iter: I) -> Self {
        let mut counter = ContributionCounter::new();
        for (date, count) in iter {
            *counter.counts.entry(date).or_default() += count;
        }
        counter
    }
}
