// Sat Oct 17 2026 - Alex

use crate::jit::compiler::CompiledScanner;
use crate::memory::{Address, Region};
use rayon::prelude::*;

/// Drives one compiled scanner over caller-supplied regions.
///
/// A session borrows its scanner, so the scanner cannot be released while
/// the session is alive.
#[derive(Clone, Copy)]
pub struct ScanSession<'a> {
    scanner: &'a CompiledScanner,
}

impl<'a> ScanSession<'a> {
    pub(crate) fn new(scanner: &'a CompiledScanner) -> Self {
        Self { scanner }
    }

    pub fn original_length(&self) -> usize {
        self.scanner.original_length()
    }

    /// Returns the first match, in ascending address order, that `pred` accepts.
    pub fn scan_predicate<F>(&self, region: &Region<'_>, mut pred: F) -> Option<Address>
    where
        F: FnMut(Address) -> bool,
    {
        let length = self.scanner.original_length();
        let last = match region.last_start(length) {
            Some(last) => last,
            None => {
                log::trace!("{} shorter than pattern length {}, skipping", region, length);
                return None;
            }
        };

        let end = region.end();
        let mut current = region.start();

        loop {
            // SAFETY: `current <= last`, so at least `length` readable bytes
            // remain before `end`.
            let hit = unsafe { self.scanner.routine().invoke(current.as_ptr(), end.as_ptr()) };
            if hit.is_null() {
                return None;
            }

            let found = Address::from_ptr(hit);
            if pred(found) {
                return Some(found);
            }
            current = found.next_candidate(last)?;
        }
    }

    pub fn scan_first(&self, region: &Region<'_>) -> Option<Address> {
        self.scan_predicate(region, |_| true)
    }

    pub fn scan_all(&self, region: &Region<'_>) -> Vec<Address> {
        let mut results = Vec::new();
        self.scan_predicate(region, |addr| {
            results.push(addr);
            false
        });
        results
    }

    /// Offsets of every match inside `data`.
    pub fn scan_slice(&self, data: &[u8]) -> Vec<usize> {
        let region = Region::from_slice(data);
        self.scan_all(&region)
            .into_iter()
            .filter_map(|addr| region.offset_of(addr))
            .collect()
    }

    /// Scans each region on the rayon pool. Results keep region order, then
    /// address order.
    pub fn scan_regions(&self, regions: &[Region<'_>]) -> Vec<Address> {
        regions
            .par_iter()
            .map(|region| self.scan_all(region))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::compiler::Compiler;
    use crate::jit::cranelift::CraneliftBackend;
    use crate::jit::program::ProgramBackend;
    use crate::jit::backend::{CodeBackend, EmitFn, ScanRoutine};
    use crate::jit::JitError;
    use crate::pattern::{Pattern, PatternBuilder};
    use crate::utils::logging::init_test_logger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Program routine that counts how often it is entered.
    struct CountedRoutine {
        inner: Box<dyn ScanRoutine>,
        calls: Arc<AtomicUsize>,
    }

    impl ScanRoutine for CountedRoutine {
        unsafe fn invoke(&self, current: *const u8, end: *const u8) -> *const u8 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.invoke(current, end)
        }

        fn release(self: Box<Self>) {
            self.inner.release();
        }
    }

    struct CountingBackend {
        inner: ProgramBackend,
        calls: Arc<AtomicUsize>,
    }

    impl CodeBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn vector_lanes(&self) -> Option<usize> {
            self.inner.vector_lanes()
        }

        fn assemble(&mut self, body: &mut EmitFn<'_>) -> Result<Box<dyn ScanRoutine>, JitError> {
            let inner = self.inner.assemble(body)?;
            Ok(Box::new(CountedRoutine {
                inner,
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    fn backends() -> Vec<Box<dyn CodeBackend>> {
        let mut out: Vec<Box<dyn CodeBackend>> = vec![
            Box::new(ProgramBackend::new()),
            Box::new(ProgramBackend::new().with_lanes(0)),
            Box::new(ProgramBackend::new().with_lanes(4)),
        ];
        if CraneliftBackend::host_supported() {
            out.push(Box::new(CraneliftBackend::new()));
        }
        out
    }

    /// Runs `check` against every backend with fast-skip both on and off.
    fn for_each_scanner(pattern: &Pattern, mut check: impl FnMut(&str, ScanSession<'_>)) {
        init_test_logger();
        for mut backend in backends() {
            for fast_skip in [true, false] {
                let scanner = Compiler::new()
                    .with_fast_skip(fast_skip)
                    .compile(pattern, backend.as_mut())
                    .unwrap();
                let label = format!("{} lanes={:?} fast_skip={}", backend.name(), backend.vector_lanes(), fast_skip);
                check(&label, ScanSession::new(&scanner));
                scanner.release();
            }
        }
    }

    /// Deterministic xorshift bytes over a small alphabet so anchors repeat.
    fn noise(len: usize, seed: u64) -> Vec<u8> {
        let mut state = seed | 1;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                [0x01, 0x02, 0x04, 0x05, 0x41, 0x90, 0xE8, 0xFF][(state % 8) as usize]
            })
            .collect()
    }

    #[test]
    fn test_wildcard_pattern_finds_single_match() {
        let pattern = PatternBuilder::new()
            .bytes(&[0x01, 0x02])
            .wildcard()
            .bytes(&[0x04, 0x05])
            .build();
        let data = [0x50, 0x50, 0x01, 0x02, 0x03, 0x04, 0x05];
        for_each_scanner(&pattern, |label, session| {
            assert_eq!(session.scan_slice(&data), vec![2], "{}", label);
        });
    }

    #[test]
    fn test_overlapping_matches() {
        let pattern = Pattern::exact(&[0x41, 0x41]);
        for_each_scanner(&pattern, |label, session| {
            assert_eq!(session.scan_slice(&[0x41, 0x41, 0x41]), vec![0, 1], "{}", label);
        });
    }

    #[test]
    fn test_partial_mask() {
        let pattern = Pattern::with_mask(&[0x10], &[0x0F]).unwrap();
        let data = [0x30, 0x11, 0x10, 0xF0];
        for_each_scanner(&pattern, |label, session| {
            assert_eq!(session.scan_slice(&data), vec![0, 2, 3], "{}", label);
        });
    }

    #[test]
    fn test_region_shorter_than_pattern() {
        let pattern = Pattern::exact(&[0x01, 0x02, 0x03]);
        for_each_scanner(&pattern, |label, session| {
            assert!(session.scan_slice(&[0x01, 0x02]).is_empty(), "{}", label);
            assert!(session.scan_slice(&[]).is_empty(), "{}", label);
        });
    }

    #[test]
    fn test_short_region_never_enters_routine() {
        init_test_logger();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut backend = CountingBackend {
            inner: ProgramBackend::new(),
            calls: Arc::clone(&calls),
        };
        let pattern = Pattern::exact(&[0x01, 0x02, 0x03]);
        let scanner = Compiler::new().compile(&pattern, &mut backend).unwrap();
        let session = ScanSession::new(&scanner);

        assert!(session.scan_slice(&[]).is_empty());
        assert!(session.scan_slice(&[0x01, 0x02]).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(session.scan_slice(&[0x09, 0x09, 0x09]).is_empty());
        assert!(calls.load(Ordering::SeqCst) >= 1);

        assert_eq!(session.scan_slice(&[0x01, 0x02, 0x03]), vec![0]);
        scanner.release();
    }

    #[test]
    fn test_trailing_wildcards_need_room() {
        let pattern = PatternBuilder::new().byte(0xAA).wildcards(2).build();
        for_each_scanner(&pattern, |label, session| {
            assert_eq!(session.scan_slice(&[0xAA, 0x00, 0xAA, 0x00]), vec![0], "{}", label);
        });
    }

    #[test]
    fn test_match_at_region_end() {
        let pattern = Pattern::exact(&[0xE8, 0x90]);
        let mut data = vec![0u8; 37];
        data[35] = 0xE8;
        data[36] = 0x90;
        for_each_scanner(&pattern, |label, session| {
            assert_eq!(session.scan_slice(&data), vec![35], "{}", label);
        });
    }

    #[test]
    fn test_every_match_in_noise_is_reported() {
        let pattern = PatternBuilder::new()
            .byte(0xE8)
            .wildcard()
            .masked(0x00, 0xF0)
            .byte(0x41)
            .build();
        let data = noise(4096, 0x9E37_79B9_7F4A_7C15);
        let expected = pattern.find_all_in(&data);
        assert!(!expected.is_empty());

        for_each_scanner(&pattern, |label, session| {
            assert_eq!(session.scan_slice(&data), expected, "{}", label);
        });
    }

    #[test]
    fn test_unanchored_pattern_in_noise() {
        let pattern = PatternBuilder::new().masked(0x40, 0xF0).masked(0x01, 0x0F).build();
        let data = noise(1024, 42);
        let expected = pattern.find_all_in(&data);
        for_each_scanner(&pattern, |label, session| {
            assert_eq!(session.scan_slice(&data), expected, "{}", label);
        });
    }

    #[test]
    fn test_predicate_stops_early() {
        let pattern = Pattern::exact(&[0x05]);
        let data = [0x05, 0x00, 0x05, 0x05];
        for_each_scanner(&pattern, |label, session| {
            let region = Region::from_slice(&data);
            let mut seen = 0;
            let hit = session.scan_predicate(&region, |_| {
                seen += 1;
                seen == 2
            });
            assert_eq!(hit.and_then(|a| region.offset_of(a)), Some(2), "{}", label);
            assert_eq!(seen, 2, "{}", label);
            assert_eq!(session.scan_first(&region), Some(region.start()), "{}", label);
        });
    }

    #[test]
    fn test_scan_regions_keeps_order() {
        let pattern = Pattern::exact(&[0x90, 0x90]);
        let data = noise(2048, 7);
        let region = Region::from_slice(&data);
        let (left, right) = region.split_at(1000);

        for_each_scanner(&pattern, |label, session| {
            let mut expected = session.scan_all(&left);
            expected.extend(session.scan_all(&right));
            assert_eq!(session.scan_regions(&[left, right]), expected, "{}", label);
        });
    }
}
