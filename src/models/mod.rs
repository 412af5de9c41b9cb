pub mod application_review;
pub mod author_application;
pub mod poem;
pub mod poem_comment;
pub mod poem_like;
pub mod refresh_token;
pub mod user;

pub use application_review::{Entity as ApplicationReview, Model as ApplicationReviewModel};
pub use author_application::{Entity as AuthorApplication, Model as AuthorApplicationModel};
pub use poem::{Entity as Poem, Model as PoemModel};
pub use poem_comment::{Entity as PoemComment, Model as PoemCommentModel};
pub use poem_like::Entity as PoemLike;
pub use refresh_token::Entity as RefreshToken;
pub use user::{Entity as User, Model as UserModel};
