//! Populated mailboxes shared by the integration tests.

use mailstore_search::backend::sqlite::{NewItem, SqliteBackend};
use mailstore_search::types::flags::{
    BITMASK_ATTACHED, BITMASK_FLAGGED, BITMASK_HIGH_PRIORITY, BITMASK_LOW_PRIORITY, ID_ATTACHED,
    ID_FLAGGED, ID_HIGH_PRIORITY, ID_LOW_PRIORITY, ID_UNREAD,
};
use mailstore_search::types::{FolderRef, ItemType, TagRef};

pub const MAILBOX: i32 = 1;

pub const INBOX: i32 = 2;
pub const JUNK: i32 = 4;
pub const SENT: i32 = 5;
pub const DRAFTS: i32 = 6;
pub const CONTACTS: i32 = 7;

pub const TAG_WORK: i32 = 64;
pub const TAG_HOME: i32 = 65;

/// Operation code of view events in the default configuration.
pub const VIEW_OP: i32 = 9;

/// Creates an in-memory backend with the schema installed.
pub fn create_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

pub fn folder(id: i32) -> FolderRef {
    let name = match id {
        INBOX => "Inbox",
        JUNK => "Junk",
        SENT => "Sent",
        DRAFTS => "Drafts",
        CONTACTS => "Contacts",
        _ => "Folder",
    };
    FolderRef::new(id, name)
}

pub fn work_tag() -> TagRef {
    TagRef::user(TAG_WORK, "work", 2)
}

pub fn home_tag() -> TagRef {
    TagRef::user(TAG_HOME, "home", 1)
}

/// One row of the standard mailbox.
struct Fixture {
    item: NewItem,
    tags: Vec<i32>,
}

fn message(id: i32, folder_id: i32, date: i64, size: i64) -> NewItem {
    NewItem::message(id, folder_id).with_date(date).with_size(size)
}

fn standard_items() -> Vec<Fixture> {
    vec![
        Fixture {
            item: message(300, INBOX, 1000, 500)
                .with_subject("Budget")
                .with_sender("alice")
                .with_recipients("bob")
                .with_flags(BITMASK_ATTACHED)
                .unread()
                .with_tags(["work"]),
            tags: vec![ID_ATTACHED, ID_UNREAD, TAG_WORK],
        },
        Fixture {
            item: message(301, INBOX, 2000, 1500)
                .with_subject("apple pie")
                .with_sender("Carol")
                .with_recipients("dave")
                .with_flags(BITMASK_FLAGGED),
            tags: vec![ID_FLAGGED],
        },
        Fixture {
            item: message(302, INBOX, 3000, 10)
                .with_subject("Zebra")
                .with_sender("bob")
                .with_recipients("alice")
                .with_flags(BITMASK_HIGH_PRIORITY)
                .unread()
                .with_tags(["home"]),
            tags: vec![ID_HIGH_PRIORITY, ID_UNREAD, TAG_HOME],
        },
        Fixture {
            item: message(303, SENT, 4000, 5)
                .with_subject("budget review")
                .with_sender("me")
                .with_recipients("erin")
                .with_flags(BITMASK_LOW_PRIORITY)
                .with_tags(["work"]),
            tags: vec![ID_LOW_PRIORITY, TAG_WORK],
        },
        Fixture {
            item: message(304, SENT, 5000, 20)
                .with_subject("Hello")
                .with_sender("me")
                .with_recipients("frank"),
            tags: vec![],
        },
        Fixture {
            item: message(305, DRAFTS, 6000, 15).with_recipients("gina"),
            tags: vec![],
        },
        Fixture {
            item: message(306, DRAFTS, 7000, 25),
            tags: vec![],
        },
        Fixture {
            item: message(307, DRAFTS, 8000, 25),
            tags: vec![],
        },
        Fixture {
            item: message(308, JUNK, 9000, 100)
                .with_recipients("bob")
                .unread(),
            tags: vec![ID_UNREAD],
        },
        Fixture {
            item: NewItem::new(400, ItemType::Contact, CONTACTS).with_name("Zed"),
            tags: vec![],
        },
        Fixture {
            item: NewItem::new(401, ItemType::Contact, CONTACTS).with_name("adam"),
            tags: vec![],
        },
        Fixture {
            item: NewItem::new(402, ItemType::Contact, CONTACTS).with_name("Mike"),
            tags: vec![],
        },
    ]
}

/// Fills the live and dumpster tables with the standard mailbox.
///
/// | id  | folder | date | size | subject       | flags             | tags |
/// |-----|--------|------|------|---------------|-------------------|------|
/// | 300 | Inbox  | 1000 | 500  | Budget        | attached, unread  | work |
/// | 301 | Inbox  | 2000 | 1500 | apple pie     | flagged           |      |
/// | 302 | Inbox  | 3000 | 10   | Zebra         | high, unread      | home |
/// | 303 | Sent   | 4000 | 5    | budget review | low               | work |
/// | 304 | Sent   | 5000 | 20   | Hello         |                   |      |
/// | 305 | Drafts | 6000 | 15   |               | (rcpt gina)       |      |
/// | 306 | Drafts | 7000 | 25   |               | (no rcpt)         |      |
/// | 307 | Drafts | 8000 | 25   |               | (no rcpt)         |      |
/// | 308 | Junk   | 9000 | 100  |               | unread            |      |
///
/// Contacts 400 "Zed", 401 "adam" and 402 "Mike" live in folder 7.
pub fn populate_standard(backend: &SqliteBackend) {
    for fixture in standard_items() {
        for dumpster in [false, true] {
            backend
                .insert_item(MAILBOX, &fixture.item, dumpster)
                .expect("Failed to insert item");
        }
        for tag in &fixture.tags {
            backend
                .tag_item(MAILBOX, fixture.item.id, *tag)
                .expect("Failed to tag item");
        }
    }
}

/// A backend holding the standard mailbox.
pub fn standard_backend() -> SqliteBackend {
    let backend = create_backend();
    populate_standard(&backend);
    backend
}

/// Messages in a single folder, with sizes 5, 10, 15, 20 and 25 for ids 1
/// through 5.
pub fn sized_backend() -> SqliteBackend {
    let backend = create_backend();
    for (id, size) in (1..=5).zip([5, 10, 15, 20, 25]) {
        backend
            .insert_item(MAILBOX, &message(id, INBOX, i64::from(id) * 100, size), false)
            .expect("Failed to insert item");
    }
    backend
}

/// Drafts with recipients (ids 10, 11, 12 to "a", "b", "c"), twelve drafts
/// without (ids 20 through 31) and two inbox messages (40 to "a", 41 to "b").
pub fn drafts_backend() -> SqliteBackend {
    let backend = create_backend();
    for (id, rcpt) in [(10, "a"), (11, "b"), (12, "c")] {
        let item = message(id, DRAFTS, i64::from(id), 1).with_recipients(rcpt);
        backend
            .insert_item(MAILBOX, &item, false)
            .expect("Failed to insert draft");
    }
    for (id, rcpt) in [(40, "a"), (41, "b")] {
        let item = message(id, INBOX, i64::from(id), 1).with_recipients(rcpt);
        backend
            .insert_item(MAILBOX, &item, false)
            .expect("Failed to insert item");
    }
    for id in 20..=31 {
        backend
            .insert_item(MAILBOX, &message(id, DRAFTS, i64::from(id), 1), false)
            .expect("Failed to insert draft");
    }
    backend
}

/// Sixty messages, one in each of folders 1001 through 1060.
pub fn spread_backend() -> SqliteBackend {
    let backend = create_backend();
    for n in 0..60 {
        let item = message(500 + n, 1001 + n, i64::from(n) * 10 + 5, 1);
        backend
            .insert_item(MAILBOX, &item, false)
            .expect("Failed to insert item");
    }
    backend
}

/// January 1st 2025, 00:00 UTC, in milliseconds.
pub const JAN_1_2025: i64 = 1_735_689_600_000;
/// January 10th 2025.
pub const JAN_10_2025: i64 = JAN_1_2025 + 9 * DAY;
/// January 15th 2025.
pub const JAN_15_2025: i64 = JAN_1_2025 + 14 * DAY;
/// February 1st 2025.
pub const FEB_1_2025: i64 = JAN_1_2025 + 31 * DAY;

const DAY: i64 = 86_400_000;

/// Messages 1 (date 150) and 2 (date 250), appointments 10 (date 100,
/// starting Jan 1) and 11 (date 200, starting Feb 1) and task 12 (date 300,
/// starting Jan 15).
pub fn calendar_backend() -> SqliteBackend {
    let backend = create_backend();
    let insert = |item: NewItem| {
        backend
            .insert_item(MAILBOX, &item, false)
            .expect("Failed to insert item");
    };
    insert(message(1, INBOX, 150, 1));
    insert(message(2, INBOX, 250, 1));
    insert(NewItem::new(10, ItemType::Appointment, 10).with_date(100));
    insert(NewItem::new(11, ItemType::Appointment, 10).with_date(200));
    insert(NewItem::new(12, ItemType::Task, 15).with_date(300));

    for (id, start) in [(10, JAN_1_2025), (11, FEB_1_2025), (12, JAN_15_2025)] {
        backend
            .insert_appointment(MAILBOX, id, start, Some(start + DAY), false)
            .expect("Failed to insert appointment");
    }
    backend
}
