use std::convert::Infallible;

use futures::{stream, Stream, StreamExt};

/// Splits a payload into transfer-sized chunks, reporting the cumulative byte
/// count after each chunk is handed to the transport.
pub(crate) fn chunked_with_progress(
    data: Vec<u8>,
    chunk_size: usize,
    mut on_progress: impl FnMut(u64, u64) + Send + 'static,
) -> impl Stream<Item = Result<Vec<u8>, Infallible>> + Send + 'static {
    let total = data.len() as u64;
    let chunks: Vec<Vec<u8>> = data.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;
    stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        on_progress(sent, total);
        Ok(chunk)
    })
}

/// Percentage of `total` covered by `sent`, rounded and clamped to 0..=100.
pub(crate) fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = sent as f64 / total as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn reports_cumulative_totals_per_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let stream = chunked_with_progress(vec![7u8; 10], 4, move |sent, total| {
            sink.lock().expect("progress sink").push((sent, total));
        });
        let chunks: Vec<_> = stream.collect().await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            *seen.lock().expect("progress sink"),
            vec![(4, 10), (8, 10), (10, 10)]
        );
    }

    #[tokio::test]
    async fn empty_payload_yields_no_chunks() {
        let stream = chunked_with_progress(Vec::new(), 4, |_, _| panic!("no progress expected"));
        assert_eq!(stream.count().await, 0);
    }

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(percent_of(0, 200), 0);
        assert_eq!(percent_of(1, 200), 1);
        assert_eq!(percent_of(100, 200), 50);
        assert_eq!(percent_of(199, 200), 100);
        assert_eq!(percent_of(300, 200), 100);
        assert_eq!(percent_of(5, 0), 0);
    }
}
