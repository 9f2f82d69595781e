use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use super::timestamp_now;
use super::user::User;
use crate::entities::{posts, prelude::*, users};

/// A post joined with the account that wrote it.
#[derive(Debug, Clone)]
pub struct PostWithAuthor {
    pub post: posts::Model,
    pub author: User,
}

/// One page of posts plus the paginator totals the listing views render.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<PostWithAuthor>,
    pub page: u64,
    pub total_pages: u64,
    pub total_items: u64,
}

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, title: &str, content: &str, author_id: i32) -> Result<posts::Model> {
        let active = posts::ActiveModel {
            title: Set(title.to_string()),
            content: Set(content.to_string()),
            post_time: Set(timestamp_now()),
            author_id: Set(author_id),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert post")?;

        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<posts::Model>> {
        let post = Posts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post by ID")?;

        Ok(post)
    }

    pub async fn get_with_author(&self, id: i32) -> Result<Option<PostWithAuthor>> {
        let row = Posts::find_by_id(id)
            .find_also_related(Users)
            .one(&self.conn)
            .await
            .context("Failed to query post with author")?;

        row.map(join_author).transpose()
    }

    /// Newest-first page of all posts. `page` is 1-based. Id breaks ties
    /// between posts written in the same microsecond.
    pub async fn page_recent(&self, page: u64, page_size: u64) -> Result<PostPage> {
        let paginator = Posts::find()
            .order_by_desc(posts::Column::PostTime)
            .order_by_desc(posts::Column::Id)
            .find_also_related(Users)
            .paginate(&self.conn, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        let posts = rows
            .into_iter()
            .map(join_author)
            .collect::<Result<Vec<_>>>()?;

        Ok(PostPage {
            posts,
            page,
            total_pages: totals.number_of_pages,
            total_items: totals.number_of_items,
        })
    }

    /// Newest-first page of one author's posts. `page` is 1-based.
    pub async fn page_by_author(
        &self,
        author_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<PostPage> {
        let paginator = Posts::find()
            .filter(posts::Column::AuthorId.eq(author_id))
            .order_by_desc(posts::Column::PostTime)
            .order_by_desc(posts::Column::Id)
            .find_also_related(Users)
            .paginate(&self.conn, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        let posts = rows
            .into_iter()
            .map(join_author)
            .collect::<Result<Vec<_>>>()?;

        Ok(PostPage {
            posts,
            page,
            total_pages: totals.number_of_pages,
            total_items: totals.number_of_items,
        })
    }

    pub async fn list_all(&self) -> Result<Vec<posts::Model>> {
        let posts = Posts::find()
            .order_by_asc(posts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list posts")?;

        Ok(posts)
    }

    /// Replace title and content, refreshing `post_time` to now.
    pub async fn update(&self, id: i32, title: &str, content: &str) -> Result<posts::Model> {
        let post = Posts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post for update")?
            .ok_or_else(|| anyhow::anyhow!("Post not found: {id}"))?;

        let mut active: posts::ActiveModel = post.into();
        active.title = Set(title.to_string());
        active.content = Set(content.to_string());
        active.post_time = Set(timestamp_now());
        let model = active.update(&self.conn).await?;

        Ok(model)
    }

    /// Overwrite a single column without touching `post_time`. The bulk
    /// key-value edit screen patches titles and contents in place.
    pub async fn update_field(&self, id: i32, column: posts::Column, value: &str) -> Result<()> {
        Posts::update_many()
            .col_expr(column, Expr::value(value))
            .filter(posts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update post field")?;

        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Posts::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete post")?;

        Ok(result.rows_affected > 0)
    }
}

fn join_author((post, author): (posts::Model, Option<users::Model>)) -> Result<PostWithAuthor> {
    let author =
        author.ok_or_else(|| anyhow::anyhow!("Post {} has no matching author row", post.id))?;

    Ok(PostWithAuthor {
        post,
        author: User::from(author),
    })
}
