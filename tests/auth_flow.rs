mod common;

use storefront_api::{
    dto::auth::{LoginRequest, RegisterRequest},
    entity::sea_orm_active_enums::Role,
    error::AppError,
    middleware::auth::{AuthUser, decode_token},
    services::auth_service,
};

fn register(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: Some(email.into()),
        password: Some(password.into()),
    }
}

#[tokio::test]
async fn register_then_login_yields_working_token() -> anyhow::Result<()> {
    let state = common::setup_state().await?;

    let registered = auth_service::register_user(&state, register("Ann@Example.com", "s3cret!"))
        .await?
        .data
        .unwrap();
    assert_eq!(registered.token_type, "Bearer");

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email: Some("ann@example.com".into()),
            password: Some("s3cret!".into()),
        },
    )
    .await?
    .data
    .unwrap();

    let user_id = decode_token(&state.config, &login.access_token)?;
    assert_eq!(decode_token(&state.config, &registered.access_token)?, user_id);

    let me = auth_service::me(
        &state,
        &AuthUser {
            user_id,
            role: Role::User,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(me.email, "ann@example.com");
    assert_eq!(me.role, Role::User);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() -> anyhow::Result<()> {
    let state = common::setup_state().await?;

    auth_service::register_user(&state, register("bob@example.com", "pw-one")).await?;
    let second = auth_service::register_user(&state, register("BOB@example.com", "pw-two")).await;

    assert!(matches!(second, Err(AppError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_unauthorized() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    auth_service::register_user(&state, register("cy@example.com", "right")).await?;

    let wrong = auth_service::login_user(
        &state,
        LoginRequest {
            email: Some("cy@example.com".into()),
            password: Some("wrong".into()),
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

    let unknown = auth_service::login_user(
        &state,
        LoginRequest {
            email: Some("nobody@example.com".into()),
            password: Some("right".into()),
        },
    )
    .await;
    assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_rejected() -> anyhow::Result<()> {
    let state = common::setup_state().await?;

    let no_password = auth_service::register_user(
        &state,
        RegisterRequest {
            email: Some("dee@example.com".into()),
            password: None,
        },
    )
    .await;
    assert!(matches!(no_password, Err(AppError::Validation(_))));

    let blank_email = auth_service::register_user(&state, register("   ", "pw")).await;
    assert!(matches!(blank_email, Err(AppError::Validation(_))));
    Ok(())
}
