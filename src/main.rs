use std::sync::Arc;

use strata::buffer::BufferPoolManager;
use strata::record::RecordManager;
use strata::storage::disk::DiskManager;

const RECORD_SIZE: usize = 16;

fn main() {
    env_logger::init();

    println!("Strata - record storage on a buffer pool");
    println!("========================================\n");

    let work_dir = std::env::temp_dir().join(format!("strata-demo-{}", std::process::id()));
    let table_path = work_dir.join("demo.tbl");

    let disk_manager = Arc::new(DiskManager::with_log_path(work_dir.join("demo.log")));
    disk_manager
        .create_dir(&work_dir)
        .expect("Failed to create demo directory");

    // Small pool so the demo has to evict
    let bpm = Arc::new(BufferPoolManager::new(4, Arc::clone(&disk_manager)));
    let manager = RecordManager::new(Arc::clone(&disk_manager), bpm);

    manager
        .create_file_with_capacity(&table_path, RECORD_SIZE, 10)
        .expect("Failed to create record file");
    println!("Created {} (10 records of {} bytes per page)", table_path.display(), RECORD_SIZE);

    let file = manager.open_file(&table_path).expect("Failed to open record file");

    let mut rids = Vec::new();
    for i in 0..25u32 {
        let mut record = [0u8; RECORD_SIZE];
        record[..4].copy_from_slice(&i.to_le_bytes());
        record[4..].copy_from_slice(b"demo-record!");
        rids.push(file.insert_record(&record).expect("Failed to insert record"));
    }
    println!("Inserted {} records, header: {:?}", rids.len(), file.file_header());

    for rid in rids.iter().filter(|rid| rid.page_no.as_u32() == 3) {
        file.delete_record(*rid).expect("Failed to delete record");
    }
    println!("Deleted the records on page 3");
    println!("Free page chain: {:?}", file.free_page_chain().expect("Bad free list"));

    let scan = file.scan().expect("Failed to start scan");
    let mut count = 0;
    for rid in scan {
        let rid = rid.expect("Scan failed");
        let record = file.get_record(rid).expect("Failed to read record");
        let id = u32::from_le_bytes(record.data()[..4].try_into().unwrap());
        if count < 3 {
            println!("  {} -> id {}", rid, id);
        }
        count += 1;
    }
    println!("Scan returned {} records", count);

    manager.close_file(file).expect("Failed to close record file");
    println!(
        "\nDisk reads: {}, disk writes: {}",
        disk_manager.num_reads(),
        disk_manager.num_writes()
    );

    // Clean up
    std::fs::remove_dir_all(&work_dir).ok();
    println!("\nDemo completed successfully!");
}
