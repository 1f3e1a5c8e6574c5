//! Database operations for categories.

use rusqlite::{Connection, OptionalExtension, Row, params};
use time::UtcOffset;

use crate::{
    Error,
    category::{Category, CategoryId, CategoryName, CategoryUpdate, HexColor, NewCategory},
    db::{begin_write, is_unique_violation, now},
};

/// Create a category, generating an ID if the caller did not supply one.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if another category already has the name,
/// - or [Error::DuplicateCategoryId] if another category already has the ID,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(new_category: NewCategory, connection: &Connection) -> Result<Category, Error> {
    let category = Category {
        id: new_category.id.unwrap_or_else(CategoryId::generate),
        name: new_category.name,
        color: new_category.color,
        icon: new_category.icon,
        created_at: now(),
    };

    connection
        .execute(
            "INSERT INTO category (id, name, color, icon, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                category.id.as_ref(),
                category.name.as_ref(),
                category.color.as_ref().map(|color| color.as_ref()),
                category.icon,
                category.created_at,
            ],
        )
        .map_err(|error| map_write_error(error, &category))?;

    Ok(category)
}

/// Give each stored category that shares an ID with one of `categories` a
/// placeholder name.
///
/// Run before [upsert_category] so that a snapshot may swap or rotate the
/// names of stored categories without tripping the unique name constraint.
/// `connection` must be inside an SQL transaction, the placeholders are only
/// valid until the final names are written.
pub(crate) fn release_category_names(
    categories: &[Category],
    connection: &Connection,
) -> Result<(), Error> {
    let mut statement = connection.prepare("UPDATE category SET name = ?1 WHERE id = ?2")?;

    for category in categories {
        let placeholder = format!("\u{0}importing:{}", category.id);
        statement.execute(params![placeholder, category.id.as_ref()])?;
    }

    Ok(())
}

/// Insert `category` or, if its ID is taken, overwrite the stored category with it.
///
/// Used when restoring a snapshot, so `created_at` is kept as given. Stored
/// transactions in the category get its new name, callers that also restore
/// transactions should write them afterwards so their own names are kept.
pub(crate) fn upsert_category(category: &Category, connection: &Connection) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO category (id, name, color, icon, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                color = excluded.color,
                icon = excluded.icon,
                created_at = excluded.created_at",
            params![
                category.id.as_ref(),
                category.name.as_ref(),
                category.color.as_ref().map(|color| color.as_ref()),
                category.icon,
                category.created_at.to_offset(UtcOffset::UTC),
            ],
        )
        .map_err(|error| map_write_error(error, category))?;

    connection.execute(
        "UPDATE \"transaction\" SET category_name = ?1 WHERE category_id = ?2 AND category_name <> ?1",
        params![category.name.as_ref(), category.id.as_ref()],
    )?;

    Ok(())
}

/// Retrieve a single category by ID.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if no category has the ID `id`.
pub fn get_category(id: &CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, color, icon, created_at FROM category WHERE id = :id;")?
        .query_row(&[(":id", id.as_ref())], map_row)
        .optional()?
        .ok_or_else(|| Error::CategoryNotFound(id.clone()))
}

/// Retrieve all categories in the order they were created.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, color, icon, created_at FROM category ORDER BY created_at ASC, rowid ASC;",
        )?
        .query_map([], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Apply the fields set in `update` to the category `id` and return the result.
///
/// Renaming a category also renames the copies of the name held by its
/// transactions, in the same SQL transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyUpdate] if `update` does not set any fields,
/// - or [Error::CategoryNotFound] if `id` does not refer to a category,
/// - or [Error::DuplicateCategoryName] if the new name is used by another category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_category(
    id: &CategoryId,
    update: CategoryUpdate,
    connection: &Connection,
) -> Result<Category, Error> {
    if update.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    let transaction = begin_write(connection)?;
    let mut category = get_category(id, &transaction)?;

    let renamed = match update.name {
        Some(name) if name != category.name => {
            category.name = name;
            true
        }
        _ => false,
    };
    if let Some(color) = update.color {
        category.color = color;
    }
    if let Some(icon) = update.icon {
        category.icon = icon;
    }

    transaction
        .execute(
            "UPDATE category SET name = ?1, color = ?2, icon = ?3 WHERE id = ?4",
            params![
                category.name.as_ref(),
                category.color.as_ref().map(|color| color.as_ref()),
                category.icon,
                category.id.as_ref(),
            ],
        )
        .map_err(|error| map_write_error(error, &category))?;

    if renamed {
        let renamed_count = transaction.execute(
            "UPDATE \"transaction\" SET category_name = ?1 WHERE category_id = ?2",
            params![category.name.as_ref(), category.id.as_ref()],
        )?;
        tracing::debug!(
            "Renamed category {} to \"{}\" on {renamed_count} transaction(s)",
            category.id,
            category.name
        );
    }

    transaction.commit()?;

    Ok(category)
}

/// Delete a category by ID.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryInUse] if any transaction still refers to the category,
/// - or [Error::CategoryNotFound] if `id` does not refer to a category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(id: &CategoryId, connection: &Connection) -> Result<(), Error> {
    let transaction = begin_write(connection)?;

    let transaction_count: i64 = transaction.query_row(
        "SELECT COUNT(*) FROM \"transaction\" WHERE category_id = ?1",
        [id.as_ref()],
        |row| row.get(0),
    )?;

    if transaction_count > 0 {
        return Err(Error::CategoryInUse {
            category_id: id.clone(),
            transaction_count: transaction_count as u64,
        });
    }

    let rows_affected = transaction.execute("DELETE FROM category WHERE id = ?1", [id.as_ref()])?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound(id.clone()));
    }

    transaction.commit()?;

    Ok(())
}

/// Initialize the category table.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            color TEXT,
            icon TEXT,
            created_at TEXT NOT NULL
        );",
    )?;

    Ok(())
}

fn map_write_error(error: rusqlite::Error, category: &Category) -> Error {
    if is_unique_violation(&error, "category.name") {
        Error::DuplicateCategoryName(category.name.clone())
    } else if is_unique_violation(&error, "category.id") {
        Error::DuplicateCategoryId(category.id.clone())
    } else {
        error.into()
    }
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_id: String = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let raw_color: Option<String> = row.get(2)?;

    Ok(Category {
        id: CategoryId::new_unchecked(&raw_id),
        name: CategoryName::new_unchecked(&raw_name),
        color: raw_color.map(|color| HexColor::new_unchecked(&color)),
        icon: row.get(3)?,
        created_at: row.get(4)?,
    })
}
