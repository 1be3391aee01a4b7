use super::{
    TenantStackBuilder, OAUTH_CLIENT_SECRET, TENANT_KEY, USER_POOL, USER_POOL_CLIENT,
    USER_POOL_DOMAIN,
};
use crate::domain::model::intrinsic::{get_att, join, reference};
use crate::domain::model::Resource;
use crate::domain::ports::GraphSink;
use crate::utils::error::Result;
use serde_json::{json, Value};

pub const OAUTH_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// JSON keys inside the client secret; the task definition reads them by name.
pub const CLIENT_ID_KEY: &str = "clientId";
pub const CLIENT_SECRET_KEY: &str = "clientSecret";

pub(super) fn declare(builder: &TenantStackBuilder<'_>, sink: &mut dyn GraphSink) -> Result<()> {
    let config = builder.config;
    let names = config.names();

    sink.add_resource(
        USER_POOL,
        Resource::new(
            "AWS::Cognito::UserPool",
            json!({
                "UserPoolName": names.name("userpool"),
                "UsernameAttributes": ["email"],
                "AutoVerifiedAttributes": ["email"],
                "AdminCreateUserConfig": { "AllowAdminCreateUserOnly": false },
                "Schema": [{
                    "Name": "email",
                    "AttributeDataType": "String",
                    "Required": true,
                    "Mutable": true,
                }],
                "AccountRecoverySetting": {
                    "RecoveryMechanisms": [{ "Name": "verified_email", "Priority": 1 }],
                },
                "VerificationMessageTemplate": {
                    "DefaultEmailOption": "CONFIRM_WITH_CODE",
                    "EmailSubject": "Verify your email for our website!",
                    "EmailMessage": "Thanks for signing up to our website! Your verification code is {####}",
                },
            }),
        )
        .with_removal_policy(config.removal_policy()),
    )?;

    sink.add_resource(
        USER_POOL_DOMAIN,
        Resource::new(
            "AWS::Cognito::UserPoolDomain",
            json!({
                "Domain": names.name("auth"),
                "UserPoolId": reference(USER_POOL),
            }),
        ),
    )?;

    let mut callback_urls: Vec<Value> = vec![builder.redirect_url()];
    if config.frontend_enabled() {
        callback_urls.push(builder.frontend_origin());
    }
    callback_urls.extend(
        config
            .services
            .api
            .extra_callback_urls()
            .iter()
            .map(|url| json!(url)),
    );

    sink.add_resource(
        USER_POOL_CLIENT,
        Resource::new(
            "AWS::Cognito::UserPoolClient",
            json!({
                "ClientName": names.name("api-client"),
                "UserPoolId": reference(USER_POOL),
                "GenerateSecret": true,
                "AllowedOAuthFlowsUserPoolClient": true,
                "AllowedOAuthFlows": ["code"],
                "AllowedOAuthScopes": OAUTH_SCOPES,
                "SupportedIdentityProviders": ["COGNITO"],
                "CallbackURLs": callback_urls.clone(),
                "LogoutURLs": callback_urls,
                "PreventUserExistenceErrors": "ENABLED",
                "AccessTokenValidity": 60,
                "TokenValidityUnits": { "AccessToken": "minutes" },
            }),
        ),
    )?;

    sink.add_resource(
        OAUTH_CLIENT_SECRET,
        Resource::new(
            "AWS::SecretsManager::Secret",
            json!({
                "Name": format!("{}/oauth-client", names.prefix()),
                "Description": "OAuth client credentials for the API service",
                "KmsKeyId": get_att(TENANT_KEY, "Arn"),
                "SecretString": join("", vec![
                    json!(format!("{{\"{}\":\"", CLIENT_ID_KEY)),
                    reference(USER_POOL_CLIENT),
                    json!(format!("\",\"{}\":\"", CLIENT_SECRET_KEY)),
                    get_att(USER_POOL_CLIENT, "ClientSecret"),
                    json!("\"}"),
                ]),
            }),
        )
        .with_removal_policy(config.removal_policy()),
    )
}
