//! Integration tests for record files

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::buffer::BufferPoolManager;
use strata::common::{PageId, PageNo, Result, Rid, SlotId, StrataError, PAGE_SIZE};
use strata::record::{RecordFileHandle, RecordManager};
use strata::storage::disk::DiskManager;
use strata::storage::page::{RecordFileHeader, RecordLayout, RecordPage};
use tempfile::TempDir;

const RECORD_SIZE: usize = 16;

struct Fixture {
    manager: RecordManager,
    dir: TempDir,
}

impl Fixture {
    fn new(pool_size: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let dm = Arc::new(DiskManager::with_log_path(dir.path().join("db.log")));
        let bpm = Arc::new(BufferPoolManager::new(pool_size, Arc::clone(&dm)));
        Self {
            manager: RecordManager::new(dm, bpm),
            dir,
        }
    }

    fn create(&self, name: &str, records_per_page: usize) -> RecordFileHandle {
        let path = self.dir.path().join(name);
        self.manager
            .create_file_with_capacity(&path, RECORD_SIZE, records_per_page)
            .unwrap();
        self.manager.open_file(&path).unwrap()
    }
}

fn record(n: u32) -> [u8; RECORD_SIZE] {
    let mut data = [0u8; RECORD_SIZE];
    data[..4].copy_from_slice(&n.to_le_bytes());
    data[4..8].copy_from_slice(&(!n).to_le_bytes());
    data
}

fn scan_all(file: &RecordFileHandle) -> Vec<Rid> {
    file.scan()
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

#[test]
fn test_record_file_end_to_end() {
    let fixture = Fixture::new(8);
    let file = fixture.create("t.tbl", 10);

    let rids: Vec<Rid> = (0..25).map(|i| file.insert_record(&record(i)).unwrap()).collect();

    let header = file.file_header();
    assert_eq!(header.num_pages, 4);
    for (i, rid) in rids.iter().enumerate() {
        assert_eq!(rid.page_no, PageNo::new(1 + i as u32 / 10));
        assert_eq!(rid.slot_id, SlotId::new((i % 10) as u16));
    }
    assert_eq!(file.free_page_chain().unwrap(), vec![PageNo::new(3)]);

    let scanned = scan_all(&file);
    assert_eq!(scanned, rids);
    for (i, rid) in scanned.iter().enumerate() {
        assert_eq!(file.get_record(*rid).unwrap().data(), &record(i as u32));
    }

    for rid in &rids[20..] {
        file.delete_record(*rid).unwrap();
    }
    assert_eq!(scan_all(&file), &rids[..20]);
    assert_eq!(file.file_header().first_free_page_no, Some(PageNo::new(3)));
}

#[test]
fn test_record_file_slot_reuse() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 10);

    let rid1 = file.insert_record(&record(1)).unwrap();
    file.insert_record(&record(2)).unwrap();
    file.delete_record(rid1).unwrap();

    assert!(matches!(
        file.get_record(rid1),
        Err(StrataError::RecordNotFound(_))
    ));
    assert!(matches!(
        file.delete_record(rid1),
        Err(StrataError::RecordNotFound(_))
    ));

    let rid2 = file.insert_record(&record(3)).unwrap();
    assert_eq!(rid2, rid1);
    assert_eq!(file.get_record(rid2).unwrap().data(), &record(3));
}

#[test]
fn test_record_file_full_page_leaves_free_list() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 2);

    let a = file.insert_record(&record(0)).unwrap();
    assert_eq!(file.free_page_chain().unwrap(), vec![PageNo::new(1)]);

    file.insert_record(&record(1)).unwrap();
    assert_eq!(file.file_header().first_free_page_no, None);
    assert!(file.free_page_chain().unwrap().is_empty());

    // A new page is allocated once every page is full
    let c = file.insert_record(&record(2)).unwrap();
    assert_eq!(c.page_no, PageNo::new(2));
    assert_eq!(file.free_page_chain().unwrap(), vec![PageNo::new(2)]);

    // Freeing a slot on the full page puts it back at the head
    file.delete_record(a).unwrap();
    assert_eq!(
        file.free_page_chain().unwrap(),
        vec![PageNo::new(1), PageNo::new(2)]
    );

    // Deleting from a page that was not full leaves the chain alone
    file.delete_record(c).unwrap();
    assert_eq!(
        file.free_page_chain().unwrap(),
        vec![PageNo::new(1), PageNo::new(2)]
    );

    assert_eq!(file.insert_record(&record(3)).unwrap(), a);
    assert_eq!(file.free_page_chain().unwrap(), vec![PageNo::new(2)]);
}

#[test]
fn test_record_file_update_record() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 10);

    let rid = file.insert_record(&record(1)).unwrap();
    file.update_record(rid, &record(100)).unwrap();
    assert_eq!(file.get_record(rid).unwrap().data(), &record(100));
    assert_eq!(file.free_page_chain().unwrap(), vec![PageNo::new(1)]);

    let empty = Rid::new(PageNo::new(1), SlotId::new(5));
    assert!(matches!(
        file.update_record(empty, &record(2)),
        Err(StrataError::RecordNotFound(_))
    ));
}

#[test]
fn test_record_file_insert_record_at() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 2);

    // Pages 1 and 2 on the free list, page 1 at the head
    let a = file.insert_record(&record(0)).unwrap();
    file.insert_record(&record(1)).unwrap();
    let c = file.insert_record(&record(2)).unwrap();
    file.delete_record(a).unwrap();
    assert_eq!(
        file.free_page_chain().unwrap(),
        vec![PageNo::new(1), PageNo::new(2)]
    );

    assert!(matches!(
        file.insert_record_at(c, &record(9)),
        Err(StrataError::RecordAlreadyExists(_))
    ));

    // Filling page 2, which is not the head, unlinks it from the middle
    let slot = Rid::new(PageNo::new(2), SlotId::new(1));
    file.insert_record_at(slot, &record(7)).unwrap();
    assert_eq!(file.get_record(slot).unwrap().data(), &record(7));
    assert_eq!(file.free_page_chain().unwrap(), vec![PageNo::new(1)]);

    file.insert_record_at(a, &record(8)).unwrap();
    assert!(file.free_page_chain().unwrap().is_empty());
}

#[test]
fn test_record_file_validation() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 10);
    let rid = file.insert_record(&record(1)).unwrap();

    assert!(matches!(
        file.insert_record(&[0u8; RECORD_SIZE + 1]),
        Err(StrataError::RecordSizeMismatch {
            expected: RECORD_SIZE,
            actual: 17
        })
    ));
    assert!(matches!(
        file.update_record(rid, &[0u8; 3]),
        Err(StrataError::RecordSizeMismatch { .. })
    ));

    let header_rid = Rid::new(PageNo::new(0), SlotId::new(0));
    assert!(matches!(
        file.get_record(header_rid),
        Err(StrataError::PageNotExist(_))
    ));
    let beyond = Rid::new(PageNo::new(5), SlotId::new(0));
    assert!(matches!(
        file.get_record(beyond),
        Err(StrataError::PageNotExist(_))
    ));
    let bad_slot = Rid::new(PageNo::new(1), SlotId::new(10));
    assert!(matches!(
        file.get_record(bad_slot),
        Err(StrataError::RecordNotFound(_))
    ));
}

#[test]
fn test_record_file_scan_protocol() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 4);

    let mut scan = file.scan().unwrap();
    assert!(scan.is_end());
    assert!(matches!(scan.rid(), Err(StrataError::ScanEnded)));
    assert!(matches!(scan.advance(), Err(StrataError::ScanEnded)));

    let rids: Vec<Rid> = (0..6).map(|i| file.insert_record(&record(i)).unwrap()).collect();
    file.delete_record(rids[0]).unwrap();
    file.delete_record(rids[3]).unwrap();

    let mut scan = file.scan().unwrap();
    let mut seen = Vec::new();
    while !scan.is_end() {
        seen.push(scan.rid().unwrap());
        scan.advance().unwrap();
    }
    assert_eq!(seen, vec![rids[1], rids[2], rids[4], rids[5]]);
    assert!(scan.rid().is_err());
}

#[test]
fn test_record_file_persists_across_reopen() {
    let fixture = Fixture::new(3);
    let path = fixture.dir.path().join("t.tbl");
    fixture
        .manager
        .create_file_with_capacity(&path, RECORD_SIZE, 5)
        .unwrap();

    let file = fixture.manager.open_file(&path).unwrap();
    let rids: Vec<Rid> = (0..23).map(|i| file.insert_record(&record(i)).unwrap()).collect();
    file.delete_record(rids[2]).unwrap();
    let header = file.file_header();
    fixture.manager.close_file(file).unwrap();

    let file = fixture.manager.open_file(&path).unwrap();
    assert_eq!(file.file_header(), header);
    assert_eq!(scan_all(&file).len(), 22);
    assert_eq!(file.get_record(rids[22]).unwrap().data(), &record(22));

    // New pages continue after the persisted ones
    let more: Vec<Rid> = (0..10).map(|i| file.insert_record(&record(100 + i)).unwrap()).collect();
    assert_eq!(more[0], rids[2]);
    assert_eq!(more[1].page_no, PageNo::new(5));
    assert_eq!(more[3].page_no, PageNo::new(6));
    assert_eq!(file.file_header().num_pages, 8);
    fixture.manager.close_file(file).unwrap();
}

#[test]
fn test_record_manager_file_lifecycle() {
    let fixture = Fixture::new(4);
    let path = fixture.dir.path().join("t.tbl");

    fixture.manager.create_file(&path, RECORD_SIZE).unwrap();
    assert!(matches!(
        fixture.manager.create_file(&path, RECORD_SIZE),
        Err(StrataError::FileExists(_))
    ));

    let file = fixture.manager.open_file(&path).unwrap();
    assert_eq!(
        file.layout(),
        RecordLayout::with_max_capacity(RECORD_SIZE).unwrap()
    );
    assert!(matches!(
        fixture.manager.destroy_file(&path),
        Err(StrataError::FileInUse(_))
    ));
    fixture.manager.close_file(file).unwrap();

    fixture.manager.destroy_file(&path).unwrap();
    assert!(matches!(
        fixture.manager.open_file(&path),
        Err(StrataError::FileNotFound(_))
    ));

    assert!(matches!(
        fixture.manager.create_file(&path, PAGE_SIZE),
        Err(StrataError::InvalidRecordLayout(_))
    ));
    assert!(matches!(
        fixture.manager.create_file_with_capacity(&path, 100, 100),
        Err(StrataError::InvalidRecordLayout(_))
    ));
}

#[test]
fn test_record_manager_close_failure_keeps_file_open() {
    let fixture = Fixture::new(4);
    let path = fixture.dir.path().join("t.tbl");
    fixture.manager.create_file(&path, RECORD_SIZE).unwrap();
    let file = fixture.manager.open_file(&path).unwrap();
    let rid = file.insert_record(&record(1)).unwrap();
    let fd = file.fd();

    let bpm = fixture.manager.buffer_pool();
    let page_id = bpm.fetch_page(PageId::new(fd, rid.page_no)).unwrap().detach();

    let (file, err) = fixture.manager.close_file(file).unwrap_err();
    assert!(matches!(err, StrataError::PageStillPinned(id) if id == page_id));
    assert!(fixture.manager.disk_manager().is_open(fd));
    assert_eq!(file.get_record(rid).unwrap().data(), &record(1));

    bpm.unpin_page(page_id, false).unwrap();
    fixture.manager.close_file(file).unwrap();
    assert!(!fixture.manager.disk_manager().is_open(fd));

    let file = fixture.manager.open_file(&path).unwrap();
    assert_eq!(file.get_record(rid).unwrap().data(), &record(1));
    fixture.manager.close_file(file).unwrap();
    fixture.manager.destroy_file(&path).unwrap();
}

#[test]
fn test_record_file_flush_header_leaves_page_clean() {
    let fixture = Fixture::new(2);
    let file = fixture.create("t.tbl", 4);
    for i in 0..9 {
        file.insert_record(&record(i)).unwrap();
    }

    file.flush_header().unwrap();
    let bpm = fixture.manager.buffer_pool();
    let header_page = PageId::new(file.fd(), PageNo::new(0));
    assert_eq!(bpm.pin_count(header_page), Some(0));
    assert_eq!(bpm.is_dirty(header_page), Some(false));

    let mut data = [0u8; PAGE_SIZE];
    fixture
        .manager
        .disk_manager()
        .read_page(file.fd(), PageNo::new(0), &mut data)
        .unwrap();
    assert_eq!(
        RecordFileHeader::decode(&data).unwrap(),
        file.file_header()
    );
}

#[test]
fn test_record_file_detects_broken_free_list() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 2);
    let layout = file.layout();
    let bpm = fixture.manager.buffer_pool();

    // Page 1 full, page 2 alone on the free list
    let a = file.insert_record(&record(0)).unwrap();
    file.insert_record(&record(1)).unwrap();
    let c = file.insert_record(&record(2)).unwrap();
    assert_eq!(file.free_page_chain().unwrap(), vec![PageNo::new(2)]);

    // Free a slot on page 1 behind the file's back, so it has room but is
    // not on the list
    {
        let mut guard = bpm.fetch_page(PageId::new(file.fd(), a.page_no)).unwrap();
        let mut data = guard.data_mut();
        assert!(RecordPage::new(&mut data[..], layout).remove(a.slot_id));
    }
    assert!(matches!(
        file.insert_record_at(a, &record(3)),
        Err(StrataError::InvalidFileHeader(_))
    ));

    // Fill page 2 behind the file's back, leaving a full page on the list
    {
        let mut guard = bpm.fetch_page(PageId::new(file.fd(), c.page_no)).unwrap();
        let mut data = guard.data_mut();
        let slot = Rid::new(c.page_no, SlotId::new(1));
        assert!(RecordPage::new(&mut data[..], layout).insert_at(slot.slot_id, &record(4)));
    }
    assert!(matches!(
        file.free_page_chain(),
        Err(StrataError::InvalidFileHeader(_))
    ));
}

#[test]
fn test_record_manager_rejects_foreign_file() {
    let fixture = Fixture::new(4);
    let dm = fixture.manager.disk_manager();
    let path = fixture.dir.path().join("garbage.tbl");

    dm.create_file(&path).unwrap();
    let fd = dm.open_file(&path).unwrap();
    dm.write_page(fd, PageNo::new(0), &[0xAB; PAGE_SIZE]).unwrap();
    dm.close_file(fd).unwrap();

    assert!(matches!(
        fixture.manager.open_file(&path),
        Err(StrataError::InvalidFileHeader(_))
    ));
    // A failed open does not leave the file open
    fixture.manager.destroy_file(&path).unwrap();
}

#[test]
fn test_record_file_random_workload() {
    let fixture = Fixture::new(4);
    let file = fixture.create("t.tbl", 8);
    let mut rng = StdRng::seed_from_u64(42);
    let mut live: BTreeMap<Rid, u32> = BTreeMap::new();

    for step in 0..2000u32 {
        match rng.gen_range(0..10) {
            0..=5 => {
                let rid = file.insert_record(&record(step)).unwrap();
                assert!(live.insert(rid, step).is_none());
            }
            6..=8 if !live.is_empty() => {
                let idx = rng.gen_range(0..live.len());
                let rid = *live.keys().nth(idx).unwrap();
                file.delete_record(rid).unwrap();
                live.remove(&rid);
            }
            _ if !live.is_empty() => {
                let idx = rng.gen_range(0..live.len());
                let rid = *live.keys().nth(idx).unwrap();
                file.update_record(rid, &record(step)).unwrap();
                live.insert(rid, step);
            }
            _ => {}
        }
    }

    let scanned = scan_all(&file);
    assert_eq!(scanned, live.keys().copied().collect::<Vec<_>>());
    for (rid, value) in &live {
        assert_eq!(file.get_record(*rid).unwrap().data(), &record(*value));
    }

    // Every page on the free list has room, and every page with room is on it
    let chain = file.free_page_chain().unwrap();
    let num_pages = file.file_header().num_pages;
    for page in 1..num_pages {
        let count = live.keys().filter(|rid| rid.page_no.as_u32() == page).count();
        assert_eq!(chain.contains(&PageNo::new(page)), count < 8);
    }
}
