//! Data resources served through the permission rewriter.

use breeze_application::{FieldBinding, FieldType, QueryDeclaration, ResourceRegistry};
use breeze_core::AppResult;
use breeze_domain::{DataColumn, DataResource};

/// Builds the registry of platform tables exposed by the API.
pub fn built_in_registry() -> AppResult<ResourceRegistry> {
    let mut registry = ResourceRegistry::new();

    registry.register(
        DataResource::builder("user", "sys_user")
            .data_column(DataColumn::Dept)
            .user_column("id")
            .columns([
                "username",
                "display_name",
                "email",
                "phone",
                "is_lock",
                "create_time",
            ])
            .build()?,
        QueryDeclaration::new(vec![
            FieldBinding::like("username", "username"),
            FieldBinding::like("displayName", "display_name"),
            FieldBinding::equal("userId", "id").of_type(FieldType::Integer),
            FieldBinding::equal("phone", "phone"),
            FieldBinding::in_list("deptIds", "dept_id").of_type(FieldType::Integer),
            FieldBinding::equal("isLock", "is_lock").of_type(FieldType::Boolean),
            FieldBinding::range("createTimeFrom", "createTimeTo", "create_time")
                .of_type(FieldType::Timestamp),
        ])?,
    )?;

    registry.register(
        DataResource::builder("msg_user", "msg_user")
            .data_column(DataColumn::Dept)
            .data_column(DataColumn::User)
            .columns(["msg_code", "msg_title", "is_read", "create_time"])
            .build()?,
        QueryDeclaration::new(vec![
            FieldBinding::equal("userId", "user_id").of_type(FieldType::Integer),
            FieldBinding::equal("msgCode", "msg_code"),
            FieldBinding::like("msgTitle", "msg_title"),
            FieldBinding::equal("isRead", "is_read").of_type(FieldType::Boolean),
            FieldBinding::range("createTimeFrom", "createTimeTo", "create_time")
                .of_type(FieldType::Timestamp),
        ])?,
    )?;

    registry.register(
        DataResource::builder("sys_log", "sys_log")
            .data_column(DataColumn::User)
            .columns([
                "log_title",
                "log_type",
                "request_type",
                "ip",
                "result",
                "create_time",
            ])
            .build()?,
        QueryDeclaration::new(vec![
            FieldBinding::like("logTitle", "log_title"),
            FieldBinding::in_list("logTypes", "log_type"),
            FieldBinding::equal("userId", "user_id").of_type(FieldType::Integer),
            FieldBinding::equal("result", "result"),
            FieldBinding::range("createTimeFrom", "createTimeTo", "create_time")
                .of_type(FieldType::Timestamp),
        ])?,
    )?;

    Ok(registry)
}
