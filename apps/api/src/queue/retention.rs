use super::options::Retention;

/// Picks which finished jobs a retention policy drops.
///
/// `finished` holds `(job id, finished_on millis)` pairs in any order. The
/// age bound and the count bound are evaluated independently and their
/// victims merged, so a record goes as soon as either bound fires.
pub fn expired(policy: &Retention, finished: &[(String, i64)], now_ms: i64) -> Vec<String> {
    match *policy {
        Retention::KeepAll => Vec::new(),
        Retention::RemoveImmediately => finished.iter().map(|(id, _)| id.clone()).collect(),
        Retention::Bounded { age, count } => {
            let mut newest_first: Vec<&(String, i64)> = finished.iter().collect();
            newest_first.sort_by(|a, b| b.1.cmp(&a.1));

            newest_first
                .into_iter()
                .enumerate()
                .filter(|(rank, (_, finished_on))| {
                    let too_old = age.is_some_and(|secs| {
                        let age_ms = i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX);
                        now_ms.saturating_sub(*finished_on) >= age_ms
                    });
                    let crowded_out = count.is_some_and(|keep| *rank >= keep);
                    too_old || crowded_out
                })
                .map(|(_, (id, _))| id.clone())
                .collect()
        }
    }
}
