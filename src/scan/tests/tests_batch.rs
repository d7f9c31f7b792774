#[cfg(test)]
mod tests {
    use crate::buffer::{BufferError, WriteBuffer};
    use crate::data::Mutation;
    use crate::scan::{RangeScanner, ScanError, ScanRange};
    use tracing::Level;
    use tracing_subscriber::fmt::Subscriber;

    fn init_tracing() {
        let _ = Subscriber::builder()
            .with_max_level(Level::TRACE)
            .try_init();
    }

    fn put_cell(buffer: &WriteBuffer, row: &[u8], ts: i64, value: &[u8], count: u32) {
        let mut m = Mutation::new(row.to_vec());
        m.put(b"cf".to_vec(), b"cq".to_vec(), b"".to_vec(), ts, value.to_vec());
        buffer.put(&m, count).unwrap();
    }

    fn scan_rows(buffer: &WriteBuffer) -> Vec<Vec<u8>> {
        let mut scanner = RangeScanner::new(buffer);
        scanner.seek(ScanRange::all(), &[], false).unwrap();

        let mut rows = Vec::new();
        while scanner.has_top() {
            rows.push(scanner.top_key().unwrap().row().to_vec());
            scanner.next().unwrap();
        }
        rows
    }

    #[test]
    fn test_scan_returns_rows_in_order() {
        init_tracing();

        let buffer = WriteBuffer::new();
        put_cell(&buffer, b"b", 0, b"vb", 1);
        put_cell(&buffer, b"a", 0, b"va", 2);
        put_cell(&buffer, b"c", 0, b"vc", 3);

        assert_eq!(
            scan_rows(&buffer),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );

        buffer.close().unwrap();
    }

    #[test]
    fn test_scan_returns_versions_newest_first() {
        init_tracing();

        let buffer = WriteBuffer::new();
        put_cell(&buffer, b"r", 1, b"v1", 1);
        put_cell(&buffer, b"r", 2, b"v2", 2);
        put_cell(&buffer, b"r", 3, b"v3", 3);

        let mut scanner = RangeScanner::new(&buffer);
        scanner.seek(ScanRange::all(), &[], false).unwrap();

        let mut values = Vec::new();
        while scanner.has_top() {
            values.push(scanner.top_value().unwrap().as_bytes().to_vec());
            scanner.next().unwrap();
        }
        assert_eq!(values, vec![b"v3".to_vec(), b"v2".to_vec(), b"v1".to_vec()]);

        buffer.close().unwrap();
    }

    #[test]
    fn test_scan_preserves_tombstones() {
        init_tracing();

        let buffer = WriteBuffer::new();
        put_cell(&buffer, b"a", 1, b"va", 1);
        let mut tombstone = Mutation::new(b"b".to_vec());
        tombstone.delete(b"cf".to_vec(), b"cq".to_vec(), b"".to_vec(), 1);
        buffer.put(&tombstone, 2).unwrap();

        let mut scanner = RangeScanner::new(&buffer);
        scanner.seek(ScanRange::all(), &[], false).unwrap();

        let mut flags = Vec::new();
        while scanner.has_top() {
            let key = scanner.top_key().unwrap();
            flags.push((key.row().to_vec(), key.is_deleted()));
            scanner.next().unwrap();
        }
        assert_eq!(flags, vec![(b"a".to_vec(), false), (b"b".to_vec(), true)]);

        buffer.close().unwrap();
    }

    #[test]
    fn test_scan_larger_than_batch_ceiling() {
        init_tracing();

        // Three-hundred entries force the batch through the full growth
        // sequence (1, 2, 4, ... 16) and many refills at the ceiling.
        let buffer = WriteBuffer::new();
        for i in 0..300u32 {
            put_cell(&buffer, format!("row{i:04}").as_bytes(), 0, b"v", i);
        }

        let rows = scan_rows(&buffer);
        assert_eq!(rows.len(), 300);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row, format!("row{i:04}").as_bytes());
        }

        buffer.close().unwrap();
    }

    #[test]
    fn test_scan_with_values_beyond_byte_ceiling() {
        init_tracing();

        // Each value alone exceeds the read-ahead ceiling; every refill
        // degrades to a single entry but the scan still sees everything.
        let buffer = WriteBuffer::new();
        for i in 0..8u32 {
            put_cell(&buffer, &[b'a' + i as u8], 0, &vec![0xAB; 5000], i);
        }

        assert_eq!(scan_rows(&buffer).len(), 8);

        buffer.close().unwrap();
    }

    #[test]
    fn test_consecutive_same_row_keys_share_row_bytes() {
        init_tracing();

        let buffer = WriteBuffer::new();
        // Separate single-column mutations to the same row, inserted out
        // of order: the cursor re-unifies the row allocation on the way
        // out.
        put_cell(&buffer, b"shared", 3, b"x", 1);
        put_cell(&buffer, b"shared", 1, b"y", 2);
        put_cell(&buffer, b"shared", 2, b"z", 3);

        let mut scanner = RangeScanner::new(&buffer);
        scanner.seek(ScanRange::all(), &[], false).unwrap();

        let mut keys = Vec::new();
        while scanner.has_top() {
            keys.push(scanner.top_key().unwrap().clone());
            scanner.next().unwrap();
        }
        assert_eq!(keys.len(), 3);
        assert!(std::sync::Arc::ptr_eq(keys[0].row_arc(), keys[1].row_arc()));
        assert!(std::sync::Arc::ptr_eq(keys[1].row_arc(), keys[2].row_arc()));

        buffer.close().unwrap();
    }

    #[test]
    fn test_scan_fails_once_buffer_closes() {
        init_tracing();

        let buffer = WriteBuffer::new();
        for i in 0..10u32 {
            put_cell(&buffer, &[b'a' + i as u8], 0, b"v", i);
        }

        let mut scanner = RangeScanner::new(&buffer);
        scanner.seek(ScanRange::all(), &[], false).unwrap();
        scanner.next().unwrap();

        buffer.close().unwrap();

        // The buffered prefix may drain, but the next refill fails.
        let result = loop {
            match scanner.next() {
                Ok(()) if scanner.has_top() => continue,
                other => break other,
            }
        };
        assert!(matches!(
            result,
            Err(ScanError::Buffer(BufferError::Closed)) | Ok(())
        ));
    }

    #[test]
    fn test_empty_buffer_scan_has_no_top() {
        init_tracing();

        let buffer = WriteBuffer::new();
        let mut scanner = RangeScanner::new(&buffer);
        scanner.seek(ScanRange::all(), &[], false).unwrap();

        assert!(!scanner.has_top());
        assert!(scanner.top_key().is_none());
        assert!(scanner.top_value().is_none());

        buffer.close().unwrap();
    }
}
