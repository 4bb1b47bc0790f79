pub mod category;
pub mod comment;
pub mod config;
pub mod content;
pub mod media;
pub mod navigation;
pub mod newsletter;
pub mod page;
pub mod pagination;
pub mod post;
pub mod theme;
pub mod user;
pub mod widget;

pub use category::{Category, CategoryCount, CategoryInput};
pub use comment::{Comment, CommentStatus, CommentThread, CommentUpdate, NewComment};
pub use config::Config;
pub use content::{
    CategoryRef, ContentRef, ContentType, ParseEnumError, Publication, PublishStatus, Seo, Tag,
    TagCount,
};
pub use media::{MediaCategory, MediaCategoryInput, MediaFilter, MediaItem, MediaItemInput, MediaType};
pub use navigation::{
    Menu, MenuInput, MenuItem, MenuItemInput, MenuItemType, MenuLocation, MenuNode, MenuTree,
};
pub use newsletter::{Newsletter, NewsletterInput, NewsletterStatus, Subscriber, SubscriberInput};
pub use page::{Page, PageInput, PageTemplate, PageTemplateInput, TemplateKind};
pub use pagination::{PageRequest, Paginated};
pub use post::{Post, PostFilter, PostInput, StatusCounts};
pub use theme::{Theme, ThemeInput};
pub use user::{AuthorRef, NewUser, ProfileUpdate, Session, User, UserInput};
pub use widget::{Widget, WidgetArea, WidgetAreaInput, WidgetInput, WidgetType};
