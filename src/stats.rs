use std::collections::BTreeMap;

use crate::models::ResultSource;

/// Per-source request counters for the service, plus how often the cache,
/// the limiter and the upstream provider were touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceStats {
    pub by_source: BTreeMap<ResultSource, u64>,
    pub requests: u64,
    pub cache_lookups: u64,
    pub limiter_checks: u64,
    pub upstream_fetches: u64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one request.
    pub fn record(&mut self, source: ResultSource) {
        self.requests += 1;
        *self.by_source.entry(source).or_insert(0) += 1;
    }

    pub fn count(&self, source: ResultSource) -> u64 {
        self.by_source.get(&source).copied().unwrap_or(0)
    }

    /// Share of requests answered without an upstream call or fallback.
    pub fn cache_hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.count(ResultSource::DailyCache) as f64 / self.requests as f64
    }

    /// Plain-text breakdown by source, one bar per source.
    pub fn generate_report(&self) -> String {
        let mut report = format!(
            "📊 Volatility requests: {} | cache lookups: {} | limiter checks: {} | upstream fetches: {} | cache hit ratio: {:.1}%\n",
            self.requests,
            self.cache_lookups,
            self.limiter_checks,
            self.upstream_fetches,
            self.cache_hit_ratio() * 100.0
        );

        if self.requests == 0 {
            report.push_str("   (No requests recorded)\n");
            return report;
        }

        for source in ResultSource::ALL {
            let count = self.count(source);
            let percentage = count as f64 / self.requests as f64 * 100.0;

            // 1 character per 5%.
            let bar = "█".repeat((percentage / 5.0).round() as usize);

            report.push_str(&format!(
                "{:<26}: {:<20} {} ({:.1}%)\n",
                source.as_str(),
                bar,
                count,
                percentage
            ));
        }

        report
    }
}
