use crate::{
    entities::{category, product},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub const MAX_CATEGORY_LEVEL: i32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 50, message = "Category name must be 1 to 50 characters"))]
    pub name: String,
    #[validate(range(min = 1, max = 3, message = "Category level must be between 1 and 3"))]
    pub level: i32,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 50, message = "Category name must be 1 to 50 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryListQuery {
    pub level: Option<i32>,
    pub parent_id: Option<Uuid>,
    pub search: Option<String>,
    /// `name`, `level` or `created_at` (default)
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default)
    pub order: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryNode {
    pub id: Uuid,
    pub name: String,
    #[schema(no_recursion)]
    pub children: Vec<CategoryNode>,
}

/// Nests categories under their parents. Siblings keep the input order;
/// categories whose parent is missing are dropped.
pub fn build_tree(categories: &[category::Model]) -> Vec<CategoryNode> {
    let mut children: HashMap<Option<Uuid>, Vec<&category::Model>> = HashMap::new();
    for cat in categories {
        children.entry(cat.parent_id).or_default().push(cat);
    }

    fn attach(
        parent: Option<Uuid>,
        children: &HashMap<Option<Uuid>, Vec<&category::Model>>,
        depth: usize,
    ) -> Vec<CategoryNode> {
        if depth > 64 {
            return Vec::new();
        }
        children
            .get(&parent)
            .map(|cats| {
                cats.iter()
                    .map(|c| CategoryNode {
                        id: c.id,
                        name: c.name.clone(),
                        children: attach(Some(c.id), children, depth + 1),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    attach(None, &children, 0)
}

/// `root` plus every category beneath it.
pub fn subtree_ids(root: Uuid, categories: &[category::Model]) -> Vec<Uuid> {
    let mut by_parent: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for cat in categories {
        if let Some(parent) = cat.parent_id {
            by_parent.entry(parent).or_default().push(cat.id);
        }
    }

    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root]);
    let mut ordered = Vec::new();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        ordered.push(id);
        if let Some(kids) = by_parent.get(&id) {
            queue.extend(kids.iter().copied());
        }
    }
    ordered
}

/// Finds a category by `(name, level)`, creating it under `parent_id` if absent.
pub async fn find_or_create_category<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    level: i32,
    parent_id: Option<Uuid>,
) -> Result<category::Model, ServiceError> {
    let name = name.trim();
    if let Some(existing) = category::Entity::find()
        .filter(category::Column::Name.eq(name))
        .filter(category::Column::Level.eq(level))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let now = Utc::now();
    category::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        level: Set(level),
        parent_id: Set(parent_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| ServiceError::from_db(e, "Category already exists"))
}

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name, level = request.level))]
    pub async fn create(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        let name = request.name.trim().to_string();
        let db = &*self.db;

        if request.level == 1 && request.parent_id.is_some() {
            return Err(ServiceError::ValidationError(
                "Top-level category cannot have a parent".to_string(),
            ));
        }

        let parent_id = if request.level == 1 {
            None
        } else {
            let parent_id = request.parent_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "Subcategories require a parent category".to_string(),
                )
            })?;
            let parent = category::Entity::find_by_id(parent_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Parent category not found".to_string()))?;
            if parent.level >= request.level {
                return Err(ServiceError::BadRequest(
                    "Category level must be greater than its parent category".to_string(),
                ));
            }
            Some(parent.id)
        };

        let duplicate = category::Entity::find()
            .filter(category::Column::Name.eq(name.as_str()))
            .filter(category::Column::Level.eq(request.level))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict("Category already exists".to_string()));
        }

        let now = Utc::now();
        let created = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            level: Set(request.level),
            parent_id: Set(parent_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| ServiceError::from_db(e, "Category already exists"))?;

        info!(category_id = %created.id, "category created");
        Ok(created)
    }

    pub async fn list(
        &self,
        query: &CategoryListQuery,
    ) -> Result<(Vec<category::Model>, u64), ServiceError> {
        let mut select = category::Entity::find();
        if let Some(level) = query.level {
            select = select.filter(category::Column::Level.eq(level));
        }
        if let Some(parent_id) = query.parent_id {
            select = select.filter(category::Column::ParentId.eq(parent_id));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(category::Column::Name)))
                    .like(format!("%{}%", search.to_lowercase())),
            );
        }

        let column = match query.sort_by.as_deref() {
            Some("name") => category::Column::Name,
            Some("level") => category::Column::Level,
            _ => category::Column::CreatedAt,
        };
        select = match query.order.as_deref() {
            Some(o) if o.eq_ignore_ascii_case("asc") => select.order_by_asc(column),
            _ => select.order_by_desc(column),
        };

        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let page = query.page.unwrap_or(1).max(1);
        let paginator = select.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, request))]
    pub async fn update_name(
        &self,
        id: Uuid,
        request: UpdateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        let db = &*self.db;
        let name = request.name.trim().to_string();

        let existing = category::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Category not found".to_string()))?;

        let conflict = || {
            ServiceError::Conflict(
                "Another category with the same name and level already exists".to_string(),
            )
        };
        let duplicate = category::Entity::find()
            .filter(category::Column::Name.eq(name.as_str()))
            .filter(category::Column::Level.eq(existing.level))
            .filter(category::Column::Id.ne(id))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(conflict());
        }

        let mut active: category::ActiveModel = existing.into();
        active.name = Set(name);
        active.updated_at = Set(Utc::now());
        active.update(db).await.map_err(|e| match ServiceError::from_db(e, "") {
            ServiceError::Conflict(_) => conflict(),
            other => other,
        })
    }

    /// Deletes a category and its whole subtree unless a product uses any of them.
    #[instrument(skip(self))]
    pub async fn delete_subtree(&self, id: Uuid) -> Result<u64, ServiceError> {
        let txn = self.db.begin().await?;

        if category::Entity::find_by_id(id).one(&txn).await?.is_none() {
            return Err(ServiceError::NotFound("Category not found".to_string()));
        }

        let all = category::Entity::find().all(&txn).await?;
        let ids = subtree_ids(id, &all);

        let in_use = product::Entity::find()
            .filter(product::Column::CategoryId.is_in(ids.clone()))
            .count(&txn)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::BadRequest(
                "Cannot delete category: a product is associated with this or a subcategory"
                    .to_string(),
            ));
        }

        let deleted = category::Entity::delete_many()
            .filter(category::Column::Id.is_in(ids))
            .exec(&txn)
            .await?
            .rows_affected;
        txn.commit().await?;

        info!(category_id = %id, deleted, "category subtree deleted");
        Ok(deleted)
    }

    pub async fn tree(&self) -> Result<Vec<CategoryNode>, ServiceError> {
        let all = category::Entity::find()
            .order_by_asc(category::Column::Level)
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(build_tree(&all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(name: &str, level: i32, parent: Option<Uuid>) -> category::Model {
        let now = Utc::now();
        category::Model {
            id: Uuid::new_v4(),
            name: name.into(),
            level,
            parent_id: parent,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let shoes = cat("Shoes", 1, None);
        let running = cat("Running", 2, Some(shoes.id));
        let trail = cat("Trail", 3, Some(running.id));
        let bags = cat("Bags", 1, None);
        let all = vec![bags.clone(), shoes.clone(), running.clone(), trail.clone()];

        let tree = build_tree(&all);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "Bags");
        assert!(tree[0].children.is_empty());
        assert_eq!(tree[1].children[0].name, "Running");
        assert_eq!(tree[1].children[0].children[0].id, trail.id);
    }

    #[test]
    fn subtree_includes_root_and_descendants_only() {
        let shoes = cat("Shoes", 1, None);
        let running = cat("Running", 2, Some(shoes.id));
        let trail = cat("Trail", 3, Some(running.id));
        let bags = cat("Bags", 1, None);
        let all = vec![shoes.clone(), running.clone(), trail.clone(), bags.clone()];

        let ids = subtree_ids(shoes.id, &all);
        assert_eq!(ids, vec![shoes.id, running.id, trail.id]);
        assert_eq!(subtree_ids(bags.id, &all), vec![bags.id]);
    }
}
