use crate::utils::error::{Result, StackError};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$").expect("static regex"));

static AWS_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(?:-gov|-iso[a-z]?)?-[a-z]+-\d{1}$").expect("static regex"));

static ACCOUNT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("static regex"));

static BUCKET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("static regex"));

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> StackError {
    StackError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

/// Accepts an absolute URL path such as `/api/v1/auth/callback`.
pub fn validate_url_path(field_name: &str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(invalid(field_name, path, "Path must start with '/'"));
    }
    let base = Url::parse("http://localhost").map_err(|e| invalid(field_name, path, e.to_string()))?;
    let joined = base
        .join(path)
        .map_err(|e| invalid(field_name, path, format!("Invalid URL path: {}", e)))?;
    if joined.path() != path || joined.query().is_some() || joined.fragment().is_some() {
        return Err(invalid(
            field_name,
            path,
            "Path must not contain query, fragment or characters needing escapes",
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

/// Lowercase DNS label; used for every component of resource and export names.
pub fn validate_dns_label(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;
    if !DNS_LABEL.is_match(value) {
        return Err(invalid(
            field_name,
            value,
            "Only lowercase letters, digits and inner hyphens are allowed",
        ));
    }
    Ok(())
}

pub fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    if !AWS_REGION.is_match(region) {
        return Err(invalid(
            field_name,
            region,
            "Not an AWS region name (e.g. us-east-1)",
        ));
    }
    Ok(())
}

pub fn validate_account_id(field_name: &str, account_id: &str) -> Result<()> {
    if !ACCOUNT_ID.is_match(account_id) {
        return Err(invalid(
            field_name,
            account_id,
            "AWS account ids are exactly 12 digits",
        ));
    }
    Ok(())
}

pub fn validate_s3_bucket_name(field_name: &str, bucket: &str) -> Result<()> {
    if !BUCKET_NAME.is_match(bucket) {
        return Err(invalid(
            field_name,
            bucket,
            "Bucket names are 3-63 lowercase letters, digits, dots or hyphens",
        ));
    }
    if bucket.contains("..") {
        return Err(invalid(field_name, bucket, "Bucket names cannot contain '..'"));
    }
    Ok(())
}

pub fn validate_max_length(field_name: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at most {} characters", max),
        ));
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| StackError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            &value.to_string(),
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}
