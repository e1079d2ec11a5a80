//! Catalog store: per-language questions, road signs and truck parts.
//!
//! Every item has an immutable internal id and a display number. Display
//! numbers form the contiguous range `1..=count` inside each
//! (section, language) partition after every mutation; add, update and delete
//! renumber inside the same transaction as the change itself.

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::core::error::{AppError, AppResult};
use crate::i18n::Language;

/// Catalog section. The string form is used in callback payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Section {
    Question,
    RoadSign,
    TruckPart,
}

impl Section {
    pub fn all() -> impl Iterator<Item = Section> {
        Section::iter()
    }

    fn table(self) -> &'static str {
        match self {
            Section::Question => "questions",
            Section::RoadSign => "road_signs",
            Section::TruckPart => "truck_parts",
        }
    }

    fn columns(self) -> &'static str {
        match self {
            Section::Question => "id, display_id, language, question, answer, audio_file_id",
            Section::RoadSign | Section::TruckPart => "id, display_id, language, image_file_id, description",
        }
    }

    /// Short singular name ("Question").
    pub fn label_key(self) -> &'static str {
        match self {
            Section::Question => "section-question",
            Section::RoadSign => "section-road-sign",
            Section::TruckPart => "section-truck-part",
        }
    }

    /// Main-menu button text.
    pub fn menu_key(self) -> &'static str {
        match self {
            Section::Question => "menu-questions",
            Section::RoadSign => "menu-road-signs",
            Section::TruckPart => "menu-truck-parts",
        }
    }

    /// Listing header.
    pub fn list_key(self) -> &'static str {
        match self {
            Section::Question => "list-questions",
            Section::RoadSign => "list-road-signs",
            Section::TruckPart => "list-truck-parts",
        }
    }
}

/// Content of a catalog item; the variant determines the section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogContent {
    Question {
        text: String,
        answer: String,
        audio: Option<String>,
    },
    RoadSign {
        image: String,
        description: Option<String>,
    },
    TruckPart {
        image: String,
        description: Option<String>,
    },
}

impl CatalogContent {
    pub fn section(&self) -> Section {
        match self {
            CatalogContent::Question { .. } => Section::Question,
            CatalogContent::RoadSign { .. } => Section::RoadSign,
            CatalogContent::TruckPart { .. } => Section::TruckPart,
        }
    }

    /// Text used on listing buttons, if the item has any.
    pub fn summary(&self) -> Option<&str> {
        match self {
            CatalogContent::Question { text, .. } => Some(text.as_str()),
            CatalogContent::RoadSign { description, .. } | CatalogContent::TruckPart { description, .. } => {
                description.as_deref().filter(|d| !d.trim().is_empty())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: i64,
    pub display_id: i64,
    pub language: Language,
    pub content: CatalogContent,
}

impl CatalogItem {
    pub fn section(&self) -> Section {
        self.content.section()
    }
}

/// One page of a partition listing. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<CatalogItem>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

impl Page {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Changes applied by [`update_item`]. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub language: Option<Language>,
    pub content: Option<CatalogContent>,
}

fn parse_row(section: Section, row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogItem> {
    let language: String = row.get(2)?;
    let content = match section {
        Section::Question => CatalogContent::Question {
            text: row.get(3)?,
            answer: row.get(4)?,
            audio: row.get(5)?,
        },
        Section::RoadSign => CatalogContent::RoadSign {
            image: row.get(3)?,
            description: row.get(4)?,
        },
        Section::TruckPart => CatalogContent::TruckPart {
            image: row.get(3)?,
            description: row.get(4)?,
        },
    };
    Ok(CatalogItem {
        id: row.get(0)?,
        display_id: row.get(1)?,
        language: Language::from_code(&language).unwrap_or_default(),
        content,
    })
}

fn next_display_id(conn: &Connection, section: Section, language: Language) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!(
            "SELECT COALESCE(MAX(display_id), 0) + 1 FROM {} WHERE language = ?1",
            section.table()
        ),
        params![language.code()],
        |row| row.get(0),
    )
}

/// Renumbers a partition to `1..=count` in internal-id order.
///
/// Every row is first moved to `-id`, which is unique across the table and
/// disjoint from the positive ranks, so `UNIQUE (display_id, language)` holds
/// row by row in both passes.
fn renumber(conn: &Connection, section: Section, language: Language) -> rusqlite::Result<usize> {
    let table = section.table();
    conn.execute(
        &format!("UPDATE {t} SET display_id = -id WHERE language = ?1", t = table),
        params![language.code()],
    )?;
    conn.execute(
        &format!(
            "UPDATE {t} SET display_id = (
                 SELECT COUNT(*) FROM {t} AS o WHERE o.language = {t}.language AND o.id <= {t}.id
             ) WHERE language = ?1",
            t = table
        ),
        params![language.code()],
    )
}

fn insert_row(conn: &Connection, display_id: i64, language: Language, content: &CatalogContent) -> rusqlite::Result<i64> {
    match content {
        CatalogContent::Question { text, answer, audio } => conn.execute(
            "INSERT INTO questions (display_id, language, question, answer, audio_file_id) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![display_id, language.code(), text, answer, audio],
        )?,
        CatalogContent::RoadSign { image, description } => conn.execute(
            "INSERT INTO road_signs (display_id, language, image_file_id, description) VALUES (?1, ?2, ?3, ?4)",
            params![display_id, language.code(), image, description],
        )?,
        CatalogContent::TruckPart { image, description } => conn.execute(
            "INSERT INTO truck_parts (display_id, language, image_file_id, description) VALUES (?1, ?2, ?3, ?4)",
            params![display_id, language.code(), image, description],
        )?,
    };
    Ok(conn.last_insert_rowid())
}

fn write_content(conn: &Connection, id: i64, content: &CatalogContent) -> rusqlite::Result<usize> {
    match content {
        CatalogContent::Question { text, answer, audio } => conn.execute(
            "UPDATE questions SET question = ?2, answer = ?3, audio_file_id = ?4 WHERE id = ?1",
            params![id, text, answer, audio],
        ),
        CatalogContent::RoadSign { image, description } => conn.execute(
            "UPDATE road_signs SET image_file_id = ?2, description = ?3 WHERE id = ?1",
            params![id, image, description],
        ),
        CatalogContent::TruckPart { image, description } => conn.execute(
            "UPDATE truck_parts SET image_file_id = ?2, description = ?3 WHERE id = ?1",
            params![id, image, description],
        ),
    }
}

/// Adds an item at the end of its partition.
pub fn add_item(conn: &Connection, language: Language, content: CatalogContent) -> rusqlite::Result<CatalogItem> {
    let section = content.section();
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let display_id = next_display_id(&tx, section, language)?;
    let id = insert_row(&tx, display_id, language, &content)?;
    tx.commit()?;

    log::info!("Catalog add: {} id={} #{} ({})", section, id, display_id, language);
    Ok(CatalogItem {
        id,
        display_id,
        language,
        content,
    })
}

pub fn get_item(conn: &Connection, section: Section, id: i64) -> rusqlite::Result<Option<CatalogItem>> {
    conn.query_row(
        &format!("SELECT {} FROM {} WHERE id = ?1", section.columns(), section.table()),
        params![id],
        |row| parse_row(section, row),
    )
    .optional()
}

/// Whole partition ordered by display number.
pub fn list_items(conn: &Connection, section: Section, language: Language) -> rusqlite::Result<Vec<CatalogItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE language = ?1 ORDER BY display_id",
        section.columns(),
        section.table()
    ))?;
    let rows = stmt.query_map(params![language.code()], |row| parse_row(section, row))?;
    rows.collect()
}

pub fn count_items(conn: &Connection, section: Section, language: Language) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE language = ?1", section.table()),
        params![language.code()],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// One page of a partition. Out-of-range pages are clamped to the last page.
pub fn list_page(
    conn: &Connection,
    section: Section,
    language: Language,
    page: usize,
    page_size: usize,
) -> rusqlite::Result<Page> {
    let page_size = page_size.max(1);
    let total = count_items(conn, section, language)?;
    let total_pages = total.div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE language = ?1 ORDER BY display_id LIMIT ?2 OFFSET ?3",
        section.columns(),
        section.table()
    ))?;
    let offset = (page - 1) * page_size;
    let items = stmt
        .query_map(params![language.code(), page_size as i64, offset as i64], |row| {
            parse_row(section, row)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Page {
        items,
        page,
        total_pages,
        total,
    })
}

/// Deletes an item and closes the gap in its partition.
///
/// Returns the deleted item, or `None` if it no longer exists.
pub fn delete_item(conn: &Connection, section: Section, id: i64) -> rusqlite::Result<Option<CatalogItem>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let Some(item) = get_item(&tx, section, id)? else {
        return Ok(None);
    };
    tx.execute(&format!("DELETE FROM {} WHERE id = ?1", section.table()), params![id])?;
    renumber(&tx, section, item.language)?;
    tx.commit()?;

    log::info!(
        "Catalog delete: {} id={} #{} ({})",
        section,
        id,
        item.display_id,
        item.language
    );
    Ok(Some(item))
}

/// Edits an item's content and/or moves it to another language.
///
/// A language move renumbers both the partition it leaves and the one it joins.
pub fn update_item(conn: &Connection, section: Section, id: i64, patch: ItemPatch) -> AppResult<CatalogItem> {
    if let Some(content) = &patch.content {
        if content.section() != section {
            return Err(AppError::Validation(format!(
                "content for {} cannot be stored in {}",
                content.section(),
                section
            )));
        }
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let current =
        get_item(&tx, section, id)?.ok_or_else(|| AppError::NotFound(format!("{} id={}", section, id)))?;

    if let Some(content) = &patch.content {
        write_content(&tx, id, content)?;
    }

    match patch.language {
        Some(target) if target != current.language => {
            // Park the row outside the positive range, then let renumbering place it.
            tx.execute(
                &format!("UPDATE {} SET language = ?2, display_id = -?1 WHERE id = ?1", section.table()),
                params![id, target.code()],
            )?;
            renumber(&tx, section, current.language)?;
            renumber(&tx, section, target)?;
        }
        _ => {}
    }

    let updated =
        get_item(&tx, section, id)?.ok_or_else(|| AppError::NotFound(format!("{} id={}", section, id)))?;
    tx.commit()?;

    log::info!("Catalog update: {} id={} now #{} ({})", section, id, updated.display_id, updated.language);
    Ok(updated)
}

/// Renumbers one partition. Returns the number of items in it.
pub fn reindex(conn: &Connection, section: Section, language: Language) -> rusqlite::Result<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let count = renumber(&tx, section, language)?;
    tx.commit()?;
    Ok(count)
}

/// Renumbers every partition. Run at startup to repair any drift.
pub fn reindex_all(conn: &Connection) -> rusqlite::Result<()> {
    for section in Section::all() {
        for language in Language::all() {
            let count = reindex(conn, section, language)?;
            log::debug!("Reindexed {} ({}): {} items", section, language, count);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_conn;
    use pretty_assertions::assert_eq;

    fn question(text: &str) -> CatalogContent {
        CatalogContent::Question {
            text: text.to_string(),
            answer: format!("answer to {text}"),
            audio: None,
        }
    }

    fn sign(image: &str) -> CatalogContent {
        CatalogContent::RoadSign {
            image: image.to_string(),
            description: None,
        }
    }

    fn display_ids(conn: &Connection, section: Section, language: Language) -> Vec<i64> {
        list_items(conn, section, language)
            .unwrap()
            .into_iter()
            .map(|i| i.display_id)
            .collect()
    }

    // ── add_item ────────────────────────────────────────────────────────────

    #[test]
    fn add_assigns_next_display_number_per_language() {
        let conn = test_conn();
        let a = add_item(&conn, Language::Uz, question("Q1")).unwrap();
        let b = add_item(&conn, Language::Ru, question("В1")).unwrap();
        let c = add_item(&conn, Language::Uz, question("Q2")).unwrap();

        assert_eq!(a.display_id, 1);
        assert_eq!(b.display_id, 1);
        assert_eq!(c.display_id, 2);
        assert!(c.id > a.id);
    }

    #[test]
    fn question_round_trip() {
        let conn = test_conn();
        let before = count_items(&conn, Section::Question, Language::Uz).unwrap();
        let added = add_item(
            &conn,
            Language::Uz,
            CatalogContent::Question {
                text: "Q1".into(),
                answer: "A1".into(),
                audio: Some("audio-file".into()),
            },
        )
        .unwrap();

        let listed = list_items(&conn, Section::Question, Language::Uz).unwrap();
        let found = listed.iter().find(|i| i.id == added.id).unwrap();
        assert_eq!(found.display_id as usize, before + 1);
        match &found.content {
            CatalogContent::Question { text, answer, audio } => {
                assert_eq!(text, "Q1");
                assert_eq!(answer, "A1");
                assert_eq!(audio.as_deref(), Some("audio-file"));
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    // ── delete_item ─────────────────────────────────────────────────────────

    #[test]
    fn delete_renumbers_higher_siblings() {
        let conn = test_conn();
        let ids: Vec<i64> = (1..=4)
            .map(|n| add_item(&conn, Language::Uz, sign(&format!("img{n}"))).unwrap().id)
            .collect();

        let deleted = delete_item(&conn, Section::RoadSign, ids[1]).unwrap().unwrap();
        assert_eq!(deleted.display_id, 2);
        assert_eq!(display_ids(&conn, Section::RoadSign, Language::Uz), vec![1, 2, 3]);

        // The item formerly #3 is now #2.
        let moved = get_item(&conn, Section::RoadSign, ids[2]).unwrap().unwrap();
        assert_eq!(moved.display_id, 2);
    }

    #[test]
    fn delete_missing_item_is_none() {
        let conn = test_conn();
        assert!(delete_item(&conn, Section::TruckPart, 77).unwrap().is_none());
    }

    #[test]
    fn delete_leaves_other_languages_alone() {
        let conn = test_conn();
        let uz = add_item(&conn, Language::Uz, question("a")).unwrap();
        add_item(&conn, Language::Es, question("b")).unwrap();
        add_item(&conn, Language::Es, question("c")).unwrap();

        delete_item(&conn, Section::Question, uz.id).unwrap();
        assert_eq!(display_ids(&conn, Section::Question, Language::Es), vec![1, 2]);
        assert!(display_ids(&conn, Section::Question, Language::Uz).is_empty());
    }

    #[test]
    fn mixed_adds_and_deletes_stay_contiguous() {
        let conn = test_conn();
        let mut live = Vec::new();
        for round in 0..12 {
            let item = add_item(&conn, Language::Ru, question(&format!("q{round}"))).unwrap();
            live.push(item.id);
            if round % 3 == 2 {
                let victim = live.remove(round % live.len());
                delete_item(&conn, Section::Question, victim).unwrap();
            }
            let expected: Vec<i64> = (1..=live.len() as i64).collect();
            assert_eq!(display_ids(&conn, Section::Question, Language::Ru), expected);
        }
    }

    // ── update_item ─────────────────────────────────────────────────────────

    #[test]
    fn update_language_renumbers_both_partitions() {
        let conn = test_conn();
        let first = add_item(&conn, Language::Uz, question("1")).unwrap();
        add_item(&conn, Language::Uz, question("2")).unwrap();
        add_item(&conn, Language::Ru, question("3")).unwrap();

        let moved = update_item(
            &conn,
            Section::Question,
            first.id,
            ItemPatch {
                language: Some(Language::Ru),
                content: None,
            },
        )
        .unwrap();

        assert_eq!(moved.language, Language::Ru);
        assert_eq!(display_ids(&conn, Section::Question, Language::Uz), vec![1]);
        assert_eq!(display_ids(&conn, Section::Question, Language::Ru), vec![1, 2]);
    }

    #[test]
    fn move_into_larger_partition_keeps_numbers_unique() {
        let conn = test_conn();
        for text in ["r1", "r2", "r3"] {
            add_item(&conn, Language::Ru, question(text)).unwrap();
        }
        let uz = add_item(&conn, Language::Uz, question("u1")).unwrap();
        let last_ru = add_item(&conn, Language::Ru, question("r4")).unwrap();

        let moved = update_item(
            &conn,
            Section::Question,
            uz.id,
            ItemPatch {
                language: Some(Language::Ru),
                content: None,
            },
        )
        .unwrap();

        assert_eq!(moved.display_id, 4);
        assert_eq!(display_ids(&conn, Section::Question, Language::Ru), vec![1, 2, 3, 4, 5]);
        assert!(display_ids(&conn, Section::Question, Language::Uz).is_empty());
        assert_eq!(get_item(&conn, Section::Question, last_ru.id).unwrap().unwrap().display_id, 5);
    }

    #[test]
    fn update_content_keeps_number() {
        let conn = test_conn();
        let item = add_item(&conn, Language::Es, sign("old")).unwrap();
        let updated = update_item(
            &conn,
            Section::RoadSign,
            item.id,
            ItemPatch {
                language: None,
                content: Some(CatalogContent::RoadSign {
                    image: "new".into(),
                    description: Some("stop".into()),
                }),
            },
        )
        .unwrap();
        assert_eq!(updated.display_id, 1);
        assert_eq!(updated.content.summary(), Some("stop"));
    }

    #[test]
    fn update_rejects_wrong_variant() {
        let conn = test_conn();
        let item = add_item(&conn, Language::Es, sign("x")).unwrap();
        let err = update_item(
            &conn,
            Section::RoadSign,
            item.id,
            ItemPatch {
                language: None,
                content: Some(question("q")),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn update_missing_is_not_found() {
        let conn = test_conn();
        let err = update_item(&conn, Section::Question, 5, ItemPatch::default()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    // ── paging and reindex ──────────────────────────────────────────────────

    #[test]
    fn list_page_splits_and_clamps() {
        let conn = test_conn();
        for n in 0..23 {
            add_item(&conn, Language::Uz, question(&n.to_string())).unwrap();
        }

        let first = list_page(&conn, Section::Question, Language::Uz, 1, 10).unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_pages, 3);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let last = list_page(&conn, Section::Question, Language::Uz, 99, 10).unwrap();
        assert_eq!(last.page, 3);
        assert_eq!(last.items.len(), 3);
        assert_eq!(last.items[0].display_id, 21);
        assert!(!last.has_next());
    }

    #[test]
    fn list_page_of_empty_partition() {
        let conn = test_conn();
        let page = list_page(&conn, Section::TruckPart, Language::Es, 1, 10).unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
        assert!(!page.has_next());
    }

    #[test]
    fn reindex_all_repairs_gaps() {
        let conn = test_conn();
        add_item(&conn, Language::Uz, sign("a")).unwrap();
        add_item(&conn, Language::Uz, sign("b")).unwrap();
        conn.execute("UPDATE road_signs SET display_id = display_id * 10", []).unwrap();

        reindex_all(&conn).unwrap();
        assert_eq!(display_ids(&conn, Section::RoadSign, Language::Uz), vec![1, 2]);
    }

    #[test]
    fn section_strings_match_callback_format() {
        assert_eq!(Section::RoadSign.to_string(), "road_sign");
        assert_eq!("truck_part".parse::<Section>().unwrap(), Section::TruckPart);
    }
}
