use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use kizuna::consts::{FIRST_PAGE_ID, INVALID_PAGE_ID};
use kizuna::errors::ErrorKind;
use kizuna::file::FileManager;
use kizuna::pager::Pager;
use kizuna::types::{PageId, PageType};

// ---------- helpers ----------

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_db(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("kz-pager-{prefix}-{pid}-{t}-{id}.kz"))
}

fn open_pager(path: &PathBuf, capacity: usize) -> Pager {
    let fm = FileManager::open(path.clone(), true).expect("file open");
    Pager::open(fm, capacity).expect("pager open")
}

fn alloc_data_page(pager: &mut Pager) -> PageId {
    let id = pager.new_page(PageType::Data).expect("new_page");
    pager.unpin(id, false).expect("unpin new page");
    id
}

// ---------- tests ----------

#[test]
fn bootstrap_creates_metadata_and_catalog_roots() {
    let path = unique_db("bootstrap");
    let pager = open_pager(&path, 16);

    // страница 1 + два корня каталога
    assert_eq!(pager.file().page_count().unwrap(), 3);
    assert_eq!(pager.free_count(), 0);
    assert_eq!(pager.first_trunk_id(), INVALID_PAGE_ID);
    assert_eq!(pager.next_table_id(), 1);
    assert_eq!(pager.catalog_tables_root(), 2);
    assert_eq!(pager.catalog_columns_root(), 3);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn freelist_reuse_survives_reopen() {
    let path = unique_db("freelist");
    {
        let mut pager = open_pager(&path, 16);

        let a = alloc_data_page(&mut pager);
        let b = alloc_data_page(&mut pager);
        let c = alloc_data_page(&mut pager);
        let d = alloc_data_page(&mut pager);
        let freed = [a, b, c, d];
        assert_eq!(pager.file().page_count().unwrap(), 7);

        pager.free_page(a).unwrap();
        pager.free_page(d).unwrap();
        pager.free_page(b).unwrap();
        pager.free_page(c).unwrap();
        assert_eq!(pager.free_count(), 4);
        assert_ne!(pager.first_trunk_id(), INVALID_PAGE_ID);

        // два новых id берутся из освобождённых, файл не растёт
        let x = alloc_data_page(&mut pager);
        let y = alloc_data_page(&mut pager);
        assert!(freed.contains(&x), "id {} must be reused", x);
        assert!(freed.contains(&y), "id {} must be reused", y);
        assert_ne!(x, y);
        assert_eq!(pager.file().page_count().unwrap(), 7);
        assert_eq!(pager.free_count(), 2);
    }

    // после close/reopen остаток freelist продолжает переиспользоваться
    {
        let mut pager = open_pager(&path, 16);
        assert_eq!(pager.free_count(), 2);

        let x = alloc_data_page(&mut pager);
        let y = alloc_data_page(&mut pager);
        assert!(x <= 7 && x > FIRST_PAGE_ID);
        assert!(y <= 7 && y > FIRST_PAGE_ID);
        assert_eq!(pager.file().page_count().unwrap(), 7);
        assert_eq!(pager.free_count(), 0);

        // freelist пуст — следующая аллокация растит файл
        let z = alloc_data_page(&mut pager);
        assert_eq!(z, 8);
        assert_eq!(pager.file().page_count().unwrap(), 8);
    }

    let _ = std::fs::remove_file(&path);
}

#[test]
fn trunk_page_itself_is_allocated_last() {
    let path = unique_db("trunk-last");
    let mut pager = open_pager(&path, 16);

    let a = alloc_data_page(&mut pager);
    let b = alloc_data_page(&mut pager);
    pager.free_page(a).unwrap(); // становится головным trunk'ом
    pager.free_page(b).unwrap(); // leaf в trunk'е a
    assert_eq!(pager.first_trunk_id(), a);
    assert_eq!(pager.free_count(), 2);

    // сперва leaf, затем сама trunk-страница
    let first = alloc_data_page(&mut pager);
    assert_eq!(first, b);
    assert_eq!(pager.first_trunk_id(), a);
    let second = alloc_data_page(&mut pager);
    assert_eq!(second, a);
    assert_eq!(pager.first_trunk_id(), INVALID_PAGE_ID);
    assert_eq!(pager.free_count(), 0);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn cache_full_when_everything_pinned() {
    let path = unique_db("cache-full");
    let mut pager = {
        let fm = FileManager::open(path.clone(), true).expect("file open");
        Pager::open(fm, 2).expect("pager open")
    };

    pager.fetch(2, true).unwrap();
    pager.fetch(3, true).unwrap();

    // оба фрейма запинены — выселять нечего
    let err = pager.fetch(FIRST_PAGE_ID, true).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CacheFull);

    // освобождение одного фрейма открывает дорогу
    pager.unpin(3, false).unwrap();
    pager.fetch(FIRST_PAGE_ID, true).unwrap();
    pager.unpin(FIRST_PAGE_ID, false).unwrap();
    pager.unpin(2, false).unwrap();

    let _ = std::fs::remove_file(&path);
}

#[test]
fn dirty_eviction_writes_page_back() {
    let path = unique_db("dirty-evict");
    let mut pager = {
        let fm = FileManager::open(path.clone(), true).expect("file open");
        Pager::open(fm, 1).expect("pager open")
    };

    let slot = {
        let page = pager.fetch(2, true).unwrap();
        page.insert(b"survives eviction").unwrap().unwrap()
    };
    pager.unpin(2, true).unwrap();

    // единственный фрейм: fetch другой страницы выселяет и пишет страницу 2
    pager.fetch(3, true).unwrap();
    pager.unpin(3, false).unwrap();

    let page = pager.fetch(2, true).unwrap();
    assert_eq!(page.read(slot).unwrap().unwrap(), b"survives eviction");
    pager.unpin(2, false).unwrap();

    let _ = std::fs::remove_file(&path);
}

#[test]
fn unpin_misuse_is_a_programming_error() {
    let path = unique_db("unpin-misuse");
    let mut pager = open_pager(&path, 4);

    let err = pager.unpin(999, false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::PageNotFound);

    pager.fetch(2, true).unwrap();
    pager.unpin(2, false).unwrap();
    let err = pager.unpin(2, false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::PageLocked);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn metadata_survives_reopen() {
    let path = unique_db("meta-persist");
    {
        let mut pager = open_pager(&path, 4);
        pager.set_next_table_id(42).unwrap();
    }
    {
        let pager = open_pager(&path, 4);
        assert_eq!(pager.next_table_id(), 42);
        assert_eq!(pager.catalog_tables_root(), 2);
        assert_eq!(pager.catalog_columns_root(), 3);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn free_page_rejects_metadata_page() {
    let path = unique_db("free-reserved");
    let mut pager = open_pager(&path, 4);
    let err = pager.free_page(FIRST_PAGE_ID).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
    let _ = std::fs::remove_file(&path);
}
