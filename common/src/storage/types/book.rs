use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, store::StorageManager},
    stored_object,
};

stored_object!(BookRecord, "book", {
    title: String,
    author: String,
    category: String,
    cover_image_url: Option<String>,
    file_path: String
});

/// A fully assembled book that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub category: String,
    pub cover_image_url: Option<String>,
    pub file_path: String,
}

/// Optional filters for [`BookRecord::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub category: Option<String>,
    pub author: Option<String>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
}

#[derive(Deserialize)]
struct CountResult {
    count: i64,
}

#[derive(Deserialize)]
struct CategoryResponse {
    category: String,
}

impl BookRecord {
    pub fn new(draft: BookDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            title: draft.title,
            author: draft.author,
            category: draft.category,
            cover_image_url: draft.cover_image_url,
            file_path: draft.file_path,
        }
    }

    /// Persist a new book. A second book at the same `file_path` is rejected by the
    /// unique index and surfaces as [`AppError::Conflict`].
    pub async fn create(draft: BookDraft, db: &SurrealDbClient) -> Result<Self, AppError> {
        let record = Self::new(draft);
        let file_path = record.file_path.clone();

        match db.store_item(record).await {
            Ok(Some(stored)) => {
                info!(book_id = %stored.id, file_path = %stored.file_path, "Book stored");
                Ok(stored)
            }
            Ok(None) => Err(AppError::InternalError(format!(
                "book at {file_path} was not returned after create"
            ))),
            Err(err) if is_unique_violation(&err) => Err(AppError::Conflict(format!(
                "a book is already stored at {file_path}"
            ))),
            Err(err) => Err(AppError::Database(err)),
        }
    }

    pub async fn find_by_path(path: &str, db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let mut books: Vec<Self> = db
            .client
            .query("SELECT * FROM type::table($table) WHERE file_path = $path LIMIT 1")
            .bind(("table", Self::table_name()))
            .bind(("path", path.to_owned()))
            .await?
            .take(0)?;

        Ok(books.pop())
    }

    pub async fn get_by_id(id: &str, db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        Ok(db.get_item::<Self>(id).await?)
    }

    /// All books matching `filter`, ordered by title.
    pub async fn list(filter: &BookFilter, db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        let mut conditions = Vec::new();
        if filter.category.is_some() {
            conditions.push("category = $category");
        }
        if filter.author.is_some() {
            conditions.push("author = $author");
        }
        if filter.search.is_some() {
            conditions.push("string::contains(string::lowercase(title), $search)");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!("SELECT * FROM type::table($table){where_clause} ORDER BY title ASC");

        let mut query = db.client.query(sql).bind(("table", Self::table_name()));
        if let Some(category) = &filter.category {
            query = query.bind(("category", category.clone()));
        }
        if let Some(author) = &filter.author {
            query = query.bind(("author", author.clone()));
        }
        if let Some(search) = &filter.search {
            query = query.bind(("search", search.to_lowercase()));
        }

        Ok(query.await?.take(0)?)
    }

    /// Page through books whose title contains `partial`, ignoring case.
    pub async fn search_by_title(
        partial: &str,
        offset: u64,
        limit: u64,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let books: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table) \
                 WHERE string::contains(string::lowercase(title), $needle) \
                 ORDER BY title ASC LIMIT $limit START $offset",
            )
            .bind(("table", Self::table_name()))
            .bind(("needle", partial.to_lowercase()))
            .bind(("limit", limit))
            .bind(("offset", offset))
            .await?
            .take(0)?;

        Ok(books)
    }

    pub async fn count(db: &SurrealDbClient) -> Result<i64, AppError> {
        let result: Option<CountResult> = db
            .client
            .query("SELECT count() as count FROM type::table($table) GROUP ALL")
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        Ok(result.map(|r| r.count).unwrap_or(0))
    }

    /// Distinct categories, sorted.
    pub async fn categories(db: &SurrealDbClient) -> Result<Vec<String>, AppError> {
        let response: Vec<CategoryResponse> = db
            .client
            .query("SELECT category FROM type::table($table) GROUP BY category")
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        let mut categories: Vec<String> = response.into_iter().map(|c| c.category).collect();
        categories.sort();
        categories.dedup();

        Ok(categories)
    }

    /// Delete a book together with its stored file and cover.
    ///
    /// Returns `None` when no book has this id. Failing to remove a stored object is
    /// logged and does not keep the record alive.
    pub async fn delete_by_id(
        id: &str,
        db: &SurrealDbClient,
        storage: &StorageManager,
    ) -> Result<Option<Self>, AppError> {
        let Some(book) = db.delete_item::<Self>(id).await? else {
            return Ok(None);
        };

        book.remove_stored_objects(storage).await;
        info!(book_id = %book.id, file_path = %book.file_path, "Book deleted");

        Ok(Some(book))
    }

    /// Delete every book in `category`, returning how many were removed.
    pub async fn delete_by_category(
        category: &str,
        db: &SurrealDbClient,
        storage: &StorageManager,
    ) -> Result<usize, AppError> {
        let deleted: Vec<Self> = db
            .client
            .query("DELETE type::table($table) WHERE category = $category RETURN BEFORE")
            .bind(("table", Self::table_name()))
            .bind(("category", category.to_owned()))
            .await?
            .take(0)?;

        for book in &deleted {
            book.remove_stored_objects(storage).await;
        }
        info!(category = %category, count = deleted.len(), "Deleted books by category");

        Ok(deleted.len())
    }

    async fn remove_stored_objects(&self, storage: &StorageManager) {
        let locations = std::iter::once(self.file_path.as_str()).chain(self.cover_image_url.as_deref());
        for location in locations {
            if let Err(err) = storage.delete(location).await {
                warn!(book_id = %self.id, location = %location, error = %err, "Failed to remove stored object");
            }
        }
    }
}

fn is_unique_violation(err: &surrealdb::Error) -> bool {
    err.to_string().contains("already contains")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    async fn setup() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized()
            .await
            .expect("Failed to build indexes");
        db
    }

    fn draft(title: &str, author: &str, category: &str, file_path: &str) -> BookDraft {
        BookDraft {
            title: title.to_string(),
            author: author.to_string(),
            category: category.to_string(),
            cover_image_url: None,
            file_path: file_path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_path() {
        let db = setup().await;

        let created = BookRecord::create(
            draft("Dune", "Frank Herbert", "Science Fiction", "books/dune.pdf"),
            &db,
        )
        .await
        .expect("create");
        assert!(!created.id.is_empty());

        let found = BookRecord::find_by_path("books/dune.pdf", &db)
            .await
            .expect("find")
            .expect("book should exist");
        assert_eq!(found.id, created.id);
        assert_eq!(found.title, "Dune");

        let by_id = BookRecord::get_by_id(&created.id, &db)
            .await
            .expect("get by id");
        assert_eq!(by_id.map(|b| b.file_path), Some("books/dune.pdf".to_string()));

        let missing = BookRecord::find_by_path("books/other.pdf", &db)
            .await
            .expect("find missing");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_create_same_path_twice_is_conflict() {
        let db = setup().await;
        let first = draft("A", "B", "C", "books/same.pdf");

        BookRecord::create(first.clone(), &db)
            .await
            .expect("first create");
        let second = BookRecord::create(first, &db).await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(BookRecord::count(&db).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let db = setup().await;
        for d in [
            draft("The Hobbit", "Tolkien", "Fantasy", "books/hobbit.epub"),
            draft("Silmarillion", "Tolkien", "Fantasy", "books/silm.pdf"),
            draft("Hobbit Cookbook", "Someone", "Cooking", "books/cook.pdf"),
        ] {
            BookRecord::create(d, &db).await.expect("create");
        }

        let all = BookRecord::list(&BookFilter::default(), &db)
            .await
            .expect("list all");
        let titles: Vec<_> = all.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Hobbit Cookbook", "Silmarillion", "The Hobbit"]);

        let filtered = BookRecord::list(
            &BookFilter {
                category: Some("Fantasy".into()),
                author: Some("Tolkien".into()),
                search: Some("hobbit".into()),
            },
            &db,
        )
        .await
        .expect("list filtered");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "The Hobbit");
    }

    #[tokio::test]
    async fn test_search_by_title_pages() {
        let db = setup().await;
        for (i, title) in ["Rust in Action", "Programming Rust", "Go in Action"]
            .iter()
            .enumerate()
        {
            BookRecord::create(draft(title, "x", "Tech", &format!("books/{i}.pdf")), &db)
                .await
                .expect("create");
        }

        let first_page = BookRecord::search_by_title("RUST", 0, 1, &db)
            .await
            .expect("search");
        assert_eq!(first_page.len(), 1);
        assert_eq!(first_page[0].title, "Programming Rust");

        let second_page = BookRecord::search_by_title("rust", 1, 10, &db)
            .await
            .expect("search");
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].title, "Rust in Action");

        let none = BookRecord::search_by_title("python", 0, 10, &db)
            .await
            .expect("search");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_count_and_categories() {
        let db = setup().await;
        assert_eq!(BookRecord::count(&db).await.expect("count"), 0);
        assert!(BookRecord::categories(&db)
            .await
            .expect("categories")
            .is_empty());

        for (i, category) in ["History", "Art", "History"].iter().enumerate() {
            BookRecord::create(draft("t", "a", category, &format!("books/{i}.pdf")), &db)
                .await
                .expect("create");
        }

        assert_eq!(BookRecord::count(&db).await.expect("count"), 3);
        assert_eq!(
            BookRecord::categories(&db).await.expect("categories"),
            vec!["Art".to_string(), "History".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_by_id_removes_files() {
        let db = setup().await;
        let storage = StorageManager::memory();
        storage
            .put("books/a.pdf", Bytes::from_static(b"%PDF"))
            .await
            .expect("put book");
        storage
            .put("covers/cover_a.pdf.jpg", Bytes::from_static(b"jpg"))
            .await
            .expect("put cover");

        let mut d = draft("A", "B", "C", "books/a.pdf");
        d.cover_image_url = Some("covers/cover_a.pdf.jpg".into());
        let book = BookRecord::create(d, &db).await.expect("create");

        let deleted = BookRecord::delete_by_id(&book.id, &db, &storage)
            .await
            .expect("delete");
        assert_eq!(deleted.map(|b| b.id), Some(book.id.clone()));
        assert!(!storage.exists("books/a.pdf").await.expect("exists"));
        assert!(!storage
            .exists("covers/cover_a.pdf.jpg")
            .await
            .expect("exists"));

        let again = BookRecord::delete_by_id(&book.id, &db, &storage)
            .await
            .expect("delete missing");
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_delete_by_id_tolerates_missing_file() {
        let db = setup().await;
        let storage = StorageManager::memory();
        let book = BookRecord::create(draft("A", "B", "C", "books/gone.pdf"), &db)
            .await
            .expect("create");

        let deleted = BookRecord::delete_by_id(&book.id, &db, &storage)
            .await
            .expect("delete should succeed without the file");
        assert!(deleted.is_some());
        assert_eq!(BookRecord::count(&db).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_delete_by_category() {
        let db = setup().await;
        let storage = StorageManager::memory();
        for (i, category) in ["Poetry", "Poetry", "Drama"].iter().enumerate() {
            let path = format!("books/{i}.pdf");
            storage
                .put(&path, Bytes::from_static(b"%PDF"))
                .await
                .expect("put");
            BookRecord::create(draft("t", "a", category, &path), &db)
                .await
                .expect("create");
        }

        let removed = BookRecord::delete_by_category("Poetry", &db, &storage)
            .await
            .expect("delete by category");
        assert_eq!(removed, 2);
        assert_eq!(BookRecord::count(&db).await.expect("count"), 1);
        assert!(!storage.exists("books/0.pdf").await.expect("exists"));
        assert!(storage.exists("books/2.pdf").await.expect("exists"));

        let none = BookRecord::delete_by_category("Poetry", &db, &storage)
            .await
            .expect("delete by category");
        assert_eq!(none, 0);
    }
}
