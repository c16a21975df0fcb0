use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Form;

use crate::db::models::Mood;
use crate::db::users;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::ImageUpload;

/// The user named by a valid `Authorization: Bearer <token>` header.
/// Returns 401 when the header is missing, the token does not verify, or the
/// user it names no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let user_id = state.tokens.verify(token).ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        let user = users::find_user(&conn, user_id)?.ok_or(AppError::Unauthorized)?;
        Ok(CurrentUser {
            id: user.id,
            name: user.name,
        })
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Body of `POST /posts` and `PATCH /posts/{id}`, from either
/// `multipart/form-data` or `application/x-www-form-urlencoded`.
///
/// `images` is `Some` as soon as an `images` field appears at all, even an
/// empty one: that is how a client asks to clear a post's images.
#[derive(Debug, Default)]
pub struct PostForm {
    pub mood: Option<Mood>,
    pub content: Option<String>,
    pub images: Option<Vec<ImageUpload>>,
}

impl PostForm {
    fn set_text(&mut self, name: &str, value: String) -> Result<(), AppError> {
        match name {
            "content" => self.content = Some(value),
            "mood" if value.trim().is_empty() => {}
            "mood" => {
                self.mood = Some(value.parse().map_err(AppError::BadRequest)?);
            }
            _ => {}
        }
        Ok(())
    }
}

fn is_images_field(name: &str) -> bool {
    name == "images" || name == "images[]"
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let mut form = PostForm::default();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?
            {
                let name = field.name().unwrap_or("").to_string();

                if is_images_field(&name) {
                    let file_name = field.file_name().unwrap_or("").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;

                    let images = form.images.get_or_insert_with(Vec::new);
                    // An empty part still marks the field as present
                    if !data.is_empty() {
                        images.push(ImageUpload {
                            file_name,
                            content_type,
                            data,
                        });
                    }
                } else {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.set_text(&name, text)?;
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;

            for (name, value) in fields {
                if is_images_field(&name) {
                    // Files cannot travel urlencoded; the field only signals "clear"
                    form.images.get_or_insert_with(Vec::new);
                } else {
                    form.set_text(&name, value)?;
                }
            }
        } else if !content_type.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Unsupported content type: {}",
                content_type
            )));
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn parse(req: Request) -> Result<PostForm, AppError> {
        PostForm::from_request(req, &()).await
    }

    #[tokio::test]
    async fn urlencoded_form_fills_text_fields() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("content=content1&mood=sun"))
            .unwrap();

        let form = parse(req).await.unwrap();
        assert_eq!(form.content.as_deref(), Some("content1"));
        assert_eq!(form.mood, Some(Mood::Sun));
        assert!(form.images.is_none());
    }

    #[tokio::test]
    async fn unknown_mood_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("mood=hail"))
            .unwrap();

        assert!(matches!(parse(req).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn multipart_collects_images_and_empty_field_still_counts() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"content\"\r\n\r\n\
             hello\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"images\"; filename=\"a.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"images\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             \r\n\
             --{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let form = parse(req).await.unwrap();
        assert_eq!(form.content.as_deref(), Some("hello"));
        let images = form.images.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].file_name, "a.png");
        assert_eq!(images[0].content_type.as_deref(), Some("image/png"));
        assert_eq!(&images[0].data[..], b"PNGDATA");
    }

    #[tokio::test]
    async fn no_body_is_an_empty_form() {
        let req = Request::builder()
            .method("PATCH")
            .body(Body::empty())
            .unwrap();
        let form = parse(req).await.unwrap();
        assert!(form.mood.is_none() && form.content.is_none() && form.images.is_none());
    }

    #[tokio::test]
    async fn json_body_is_rejected() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        assert!(matches!(parse(req).await, Err(AppError::BadRequest(_))));
    }
}
