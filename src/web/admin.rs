//! 管理接口：`/admin/api` 下的 JSON CRUD，仅限管理员

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::error::ApiError;
use super::session::{cookie_value, SESSION_COOKIE};
use crate::auth::{self, random_token, TOKEN_LENGTH};
use crate::core::engine::Engine;
use crate::models::{
    Category, CategoryInput, Comment, CommentStatus, CommentUpdate, ContentRef, ContentType,
    MediaCategory, MediaCategoryInput, MediaFilter, MediaItem, MediaItemInput, Menu, MenuInput,
    MenuItem, MenuItemInput, NewComment, NewUser, Newsletter, NewsletterInput, NewsletterStatus,
    Page, PageInput, PageRequest, PageTemplate, PageTemplateInput, Post, PostFilter, PostInput,
    PublishStatus, Subscriber, SubscriberInput, Theme, ThemeInput, User, UserInput, Widget,
    WidgetArea, WidgetAreaInput, WidgetInput,
};

type ApiResult<T> = Result<T, ApiError>;

const DASHBOARD_RECENT: usize = 5;
/// 列表接口一次返回的最大条数
const LIST_LIMIT: usize = i64::MAX as usize;

/// 已登录的管理员；会话来自 cookie 或 `Authorization: Bearer <token>`
pub struct Staff(pub User);

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

#[async_trait]
impl FromRequestParts<Arc<Engine>> for Staff {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, engine: &Arc<Engine>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_value(&parts.headers, SESSION_COOKIE))
            .ok_or(ApiError::Unauthorized)?;
        let user = engine.store.session_user(&token)?.ok_or(ApiError::Unauthorized)?;
        if !user.is_staff {
            return Err(ApiError::Forbidden);
        }
        Ok(Staff(user))
    }
}

/// 一类可以增删改查的记录
trait Resource: Send + Sync + 'static {
    type Item: Serialize + Send;
    type Input: DeserializeOwned + Send + 'static;

    fn list(engine: &Engine) -> ApiResult<Vec<Self::Item>>;
    fn get(engine: &Engine, id: i64) -> ApiResult<Self::Item>;
    fn create(engine: &Engine, staff: &User, input: Self::Input) -> ApiResult<Self::Item>;
    fn update(engine: &Engine, id: i64, input: Self::Input) -> ApiResult<Self::Item>;
    fn delete(engine: &Engine, id: i64) -> ApiResult<()>;
}

/// 直接映射到存储层同名方法的资源
macro_rules! store_resource {
    ($name:ident: $item:ty, $input:ty => $list:ident, $get:ident, $create:ident, $update:ident, $delete:ident) => {
        struct $name;

        impl Resource for $name {
            type Item = $item;
            type Input = $input;

            fn list(engine: &Engine) -> ApiResult<Vec<$item>> {
                Ok(engine.store.$list()?)
            }

            fn get(engine: &Engine, id: i64) -> ApiResult<$item> {
                Ok(engine.store.$get(id)?)
            }

            fn create(engine: &Engine, _staff: &User, input: $input) -> ApiResult<$item> {
                Ok(engine.store.$create(&input)?)
            }

            fn update(engine: &Engine, id: i64, input: $input) -> ApiResult<$item> {
                Ok(engine.store.$update(id, &input)?)
            }

            fn delete(engine: &Engine, id: i64) -> ApiResult<()> {
                Ok(engine.store.$delete(id)?)
            }
        }
    };
}

store_resource!(Categories: Category, CategoryInput =>
    list_categories, get_category, create_category, update_category, delete_category);
store_resource!(PageTemplates: PageTemplate, PageTemplateInput =>
    list_page_templates, get_page_template, create_page_template, update_page_template, delete_page_template);
store_resource!(Pages: Page, PageInput =>
    list_pages, get_page, create_page, update_page, delete_page);
store_resource!(Menus: Menu, MenuInput =>
    list_menus, get_menu, create_menu, update_menu, delete_menu);
store_resource!(Themes: Theme, ThemeInput =>
    list_themes, get_theme, create_theme, update_theme, delete_theme);
store_resource!(WidgetAreas: WidgetArea, WidgetAreaInput =>
    list_widget_areas, get_widget_area, create_widget_area, update_widget_area, delete_widget_area);
store_resource!(Widgets: Widget, WidgetInput =>
    list_widgets, get_widget, create_widget, update_widget, delete_widget);
store_resource!(Newsletters: Newsletter, NewsletterInput =>
    list_newsletters, get_newsletter, create_newsletter, update_newsletter, delete_newsletter);
store_resource!(MediaCategories: MediaCategory, MediaCategoryInput =>
    list_media_categories, get_media_category, create_media_category, update_media_category, delete_media_category);

struct Users;

impl Resource for Users {
    type Item = User;
    type Input = UserInput;

    fn list(engine: &Engine) -> ApiResult<Vec<User>> {
        Ok(engine.store.list_users()?)
    }

    fn get(engine: &Engine, id: i64) -> ApiResult<User> {
        Ok(engine.store.get_user(id)?)
    }

    fn create(engine: &Engine, _staff: &User, input: UserInput) -> ApiResult<User> {
        let password = input
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::BadRequest("password is required".to_string()))?;
        let user = auth::create_user(
            &engine.store,
            &NewUser {
                username: input.username,
                email: input.profile.email,
                password,
                first_name: input.profile.first_name,
                last_name: input.profile.last_name,
                is_staff: input.is_staff,
                is_superuser: input.is_superuser,
            },
        )?;
        Ok(user)
    }

    fn update(engine: &Engine, id: i64, input: UserInput) -> ApiResult<User> {
        let hash = match input.password.as_deref() {
            Some(p) if !p.is_empty() => Some(auth::hash_password(p)?),
            _ => None,
        };
        Ok(engine.store.update_user(id, &input, hash.as_deref())?)
    }

    fn delete(engine: &Engine, id: i64) -> ApiResult<()> {
        Ok(engine.store.delete_user(id)?)
    }
}

struct Posts;

impl Resource for Posts {
    type Item = Post;
    type Input = PostInput;

    fn list(engine: &Engine) -> ApiResult<Vec<Post>> {
        Ok(engine.store.all_posts()?)
    }

    fn get(engine: &Engine, id: i64) -> ApiResult<Post> {
        Ok(engine.store.get_post(id)?)
    }

    fn create(engine: &Engine, staff: &User, input: PostInput) -> ApiResult<Post> {
        let author_id = input.author_id.unwrap_or(staff.id);
        Ok(engine.store.create_post(&input, author_id)?)
    }

    fn update(engine: &Engine, id: i64, input: PostInput) -> ApiResult<Post> {
        Ok(engine.store.update_post(id, &input)?)
    }

    fn delete(engine: &Engine, id: i64) -> ApiResult<()> {
        Ok(engine.store.delete_post(id)?)
    }
}

/// 管理接口中新建评论需要指定目标
#[derive(Debug, Deserialize)]
struct CommentPayload {
    content_type: Option<ContentType>,
    object_id: Option<i64>,
    #[serde(flatten)]
    fields: CommentUpdate,
}

struct Comments;

impl Resource for Comments {
    type Item = Comment;
    type Input = CommentPayload;

    fn list(engine: &Engine) -> ApiResult<Vec<Comment>> {
        Ok(engine.store.list_comments(None)?)
    }

    fn get(engine: &Engine, id: i64) -> ApiResult<Comment> {
        Ok(engine.store.get_comment(id)?)
    }

    fn create(engine: &Engine, _staff: &User, input: CommentPayload) -> ApiResult<Comment> {
        let (Some(content_type), Some(object_id)) = (input.content_type, input.object_id) else {
            return Err(ApiError::BadRequest("content_type and object_id are required".to_string()));
        };
        let target = ContentRef::new(content_type, object_id);
        if !engine.store.target_exists(target)? {
            return Err(ApiError::NotFound(format!("{content_type} {object_id} 不存在")));
        }
        let fields = input.fields;
        Ok(engine.store.create_comment(&NewComment {
            target,
            author_id: None,
            author_name: fields.author_name,
            author_email: fields.author_email,
            author_url: fields.author_url,
            content: fields.content,
            status: fields.status,
            parent_id: fields.parent_id,
            ip_address: None,
            user_agent: String::new(),
        })?)
    }

    fn update(engine: &Engine, id: i64, input: CommentPayload) -> ApiResult<Comment> {
        Ok(engine.store.update_comment(id, &input.fields)?)
    }

    fn delete(engine: &Engine, id: i64) -> ApiResult<()> {
        Ok(engine.store.delete_comment(id)?)
    }
}

struct MenuItems;

impl Resource for MenuItems {
    type Item = MenuItem;
    type Input = MenuItemInput;

    fn list(engine: &Engine) -> ApiResult<Vec<MenuItem>> {
        Ok(engine.store.list_menu_items(None)?)
    }

    fn get(engine: &Engine, id: i64) -> ApiResult<MenuItem> {
        Ok(engine.store.get_menu_item(id)?)
    }

    fn create(engine: &Engine, _staff: &User, input: MenuItemInput) -> ApiResult<MenuItem> {
        Ok(engine.store.create_menu_item(&input)?)
    }

    fn update(engine: &Engine, id: i64, input: MenuItemInput) -> ApiResult<MenuItem> {
        Ok(engine.store.update_menu_item(id, &input)?)
    }

    fn delete(engine: &Engine, id: i64) -> ApiResult<()> {
        Ok(engine.store.delete_menu_item(id)?)
    }
}

struct Subscribers;

impl Resource for Subscribers {
    type Item = Subscriber;
    type Input = SubscriberInput;

    fn list(engine: &Engine) -> ApiResult<Vec<Subscriber>> {
        Ok(engine.store.list_subscribers()?)
    }

    fn get(engine: &Engine, id: i64) -> ApiResult<Subscriber> {
        Ok(engine.store.get_subscriber(id)?)
    }

    fn create(engine: &Engine, _staff: &User, input: SubscriberInput) -> ApiResult<Subscriber> {
        Ok(engine.store.create_subscriber(&input, &random_token(TOKEN_LENGTH))?)
    }

    fn update(engine: &Engine, id: i64, input: SubscriberInput) -> ApiResult<Subscriber> {
        Ok(engine.store.update_subscriber(id, &input)?)
    }

    fn delete(engine: &Engine, id: i64) -> ApiResult<()> {
        Ok(engine.store.delete_subscriber(id)?)
    }
}

struct Media;

impl Resource for Media {
    type Item = MediaItem;
    type Input = MediaItemInput;

    fn list(engine: &Engine) -> ApiResult<Vec<MediaItem>> {
        let page = engine
            .store
            .list_media(&MediaFilter::default(), PageRequest::new(1, LIST_LIMIT))?;
        Ok(page.items)
    }

    fn get(engine: &Engine, id: i64) -> ApiResult<MediaItem> {
        Ok(engine.store.get_media(id)?)
    }

    fn create(engine: &Engine, staff: &User, input: MediaItemInput) -> ApiResult<MediaItem> {
        Ok(engine.store.create_media(&input, Some(staff.id))?)
    }

    fn update(engine: &Engine, id: i64, input: MediaItemInput) -> ApiResult<MediaItem> {
        Ok(engine.store.update_media(id, &input)?)
    }

    /// 同时删除磁盘上的文件
    fn delete(engine: &Engine, id: i64) -> ApiResult<()> {
        let item = engine.store.delete_media(id)?;
        let path = engine.media_dir().join(&item.file);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("无法删除文件 {}: {}", path.display(), e);
        }
        Ok(())
    }
}

async fn list<R: Resource>(State(engine): State<Arc<Engine>>, _staff: Staff) -> ApiResult<Json<Vec<R::Item>>> {
    Ok(Json(R::list(&engine)?))
}

async fn detail<R: Resource>(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Path(id): Path<i64>,
) -> ApiResult<Json<R::Item>> {
    Ok(Json(R::get(&engine, id)?))
}

async fn create<R: Resource>(
    State(engine): State<Arc<Engine>>,
    Staff(staff): Staff,
    Json(input): Json<R::Input>,
) -> ApiResult<(StatusCode, Json<R::Item>)> {
    Ok((StatusCode::CREATED, Json(R::create(&engine, &staff, input)?)))
}

async fn update<R: Resource>(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Path(id): Path<i64>,
    Json(input): Json<R::Input>,
) -> ApiResult<Json<R::Item>> {
    Ok(Json(R::update(&engine, id, input)?))
}

async fn remove<R: Resource>(
    State(engine): State<Arc<Engine>>,
    Staff(staff): Staff,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    R::delete(&engine, id)?;
    info!("{} 删除了 {} #{}", staff.username, std::any::type_name::<R::Item>(), id);
    Ok(StatusCode::NO_CONTENT)
}

fn resource<R: Resource>(router: Router<Arc<Engine>>, path: &str) -> Router<Arc<Engine>> {
    router
        .route(&format!("/{path}"), get(list::<R>).post(create::<R>))
        .route(
            &format!("/{path}/:id"),
            get(detail::<R>).put(update::<R>).delete(remove::<R>),
        )
}

/// 批量操作
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub action: String,
    pub affected: usize,
}

fn unknown_action(action: &str) -> ApiError {
    ApiError::BadRequest(format!("unknown action: {action}"))
}

fn publish_status(action: &str) -> ApiResult<PublishStatus> {
    match action {
        "publish" => Ok(PublishStatus::Published),
        "archive" => Ok(PublishStatus::Archived),
        "draft" => Ok(PublishStatus::Draft),
        other => Err(unknown_action(other)),
    }
}

fn done(request: ActionRequest, affected: usize) -> Json<ActionResponse> {
    info!("批量操作 {}: {} 条", request.action, affected);
    Json(ActionResponse {
        action: request.action,
        affected,
    })
}

async fn page_actions(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Json(request): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let status = publish_status(&request.action)?;
    let affected = engine.store.set_pages_status(&request.ids, status)?;
    Ok(done(request, affected))
}

async fn post_actions(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Json(request): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let affected = match request.action.as_str() {
        "feature" => engine.store.set_posts_featured(&request.ids, true)?,
        "unfeature" => engine.store.set_posts_featured(&request.ids, false)?,
        other => engine.store.set_posts_status(&request.ids, publish_status(other)?)?,
    };
    Ok(done(request, affected))
}

async fn comment_actions(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Json(request): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let status = match request.action.as_str() {
        "approve" => CommentStatus::Approved,
        "reject" => CommentStatus::Rejected,
        other => return Err(unknown_action(other)),
    };
    let affected = engine.store.set_comments_status(&request.ids, status)?;
    Ok(done(request, affected))
}

async fn subscriber_actions(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Json(request): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let active = match request.action.as_str() {
        "activate" => true,
        "deactivate" => false,
        other => return Err(unknown_action(other)),
    };
    let affected = engine.store.set_subscribers_active(&request.ids, active)?;
    Ok(done(request, affected))
}

/// send：逐个发送未发送的期刊；schedule：一小时后发送
async fn newsletter_actions(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Json(request): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let affected = match request.action.as_str() {
        "send" => {
            let mut sent = 0;
            for id in &request.ids {
                if engine.store.get_newsletter(*id)?.status == NewsletterStatus::Sent {
                    continue;
                }
                engine.send_newsletter(*id).await?;
                sent += 1;
            }
            sent
        }
        "schedule" => engine
            .store
            .schedule_newsletters(&request.ids, Utc::now() + Duration::hours(1))?,
        other => return Err(unknown_action(other)),
    };
    Ok(done(request, affected))
}

async fn theme_actions(
    State(engine): State<Arc<Engine>>,
    _staff: Staff,
    Json(request): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    if request.action != "activate" {
        return Err(unknown_action(&request.action));
    }
    let &[id] = request.ids.as_slice() else {
        return Err(ApiError::BadRequest(
            "Please select exactly one theme to activate.".to_string(),
        ));
    };
    engine.store.activate_theme(id)?;
    Ok(done(request, 1))
}

/// 首页统计：各类记录数量及最新的文章和评论
async fn dashboard(State(engine): State<Arc<Engine>>, _staff: Staff) -> ApiResult<Json<Value>> {
    let store = &engine.store;
    let recent_filter = PostFilter {
        order_by_created: true,
        ..PostFilter::default()
    };
    Ok(Json(json!({
        "counts": {
            "pages": store.count_pages()?,
            "posts": store.count_posts()?,
            "users": store.count_users()?,
            "comments": store.count_comments()?,
        },
        "recent_posts": store.recent_posts(&recent_filter, DASHBOARD_RECENT)?,
        "recent_comments": store.recent_comments(DASHBOARD_RECENT)?,
    })))
}

pub fn router() -> Router<Arc<Engine>> {
    let router = Router::new()
        .route("/dashboard", get(dashboard))
        .route("/pages/actions", post(page_actions))
        .route("/posts/actions", post(post_actions))
        .route("/comments/actions", post(comment_actions))
        .route("/subscribers/actions", post(subscriber_actions))
        .route("/newsletters/actions", post(newsletter_actions))
        .route("/themes/actions", post(theme_actions));

    let router = resource::<Users>(router, "users");
    let router = resource::<Categories>(router, "categories");
    let router = resource::<PageTemplates>(router, "page-templates");
    let router = resource::<Pages>(router, "pages");
    let router = resource::<Posts>(router, "posts");
    let router = resource::<Comments>(router, "comments");
    let router = resource::<Menus>(router, "menus");
    let router = resource::<MenuItems>(router, "menu-items");
    let router = resource::<Themes>(router, "themes");
    let router = resource::<WidgetAreas>(router, "widget-areas");
    let router = resource::<Widgets>(router, "widgets");
    let router = resource::<Subscribers>(router, "subscribers");
    let router = resource::<Newsletters>(router, "newsletters");
    let router = resource::<MediaCategories>(router, "media-categories");
    resource::<Media>(router, "media")
}
