//! 两代格式的静态映射目录。
//!
//! 目录按顺序应用在类别规则之后；同名目标属性以后出现者为准。

use crate::rule::MappingRule;

/// MRA v1 事件 → LEEF 1.0 属性。
pub static MRA_V1_CATALOG: &[MappingRule] = &[
    MappingRule::copy("id", "externalId"),
    MappingRule::copy("eventTime", "devTime"),
    MappingRule::copy("changeType", "changeType"),
    MappingRule::copy("entName", "entName"),
    MappingRule::copy("actor.type", "actorType"),
    MappingRule::copy("actor.guid", "actorGuid"),
    MappingRule::copy("target.type", "targetType"),
    MappingRule::copy("target.guid", "targetGuid"),
    MappingRule::copy("target.emailAddress", "usrName"),
    MappingRule::copy("target.platform", "devicePlatform"),
    MappingRule::copy("details.type", "detailsType"),
    MappingRule::copy("details.severity", "sev"),
    MappingRule::copy("details.status", "threatStatus"),
    MappingRule::copy("details.action", "threatAction"),
    MappingRule::copy("details.assessment", "threatAssessment"),
    MappingRule::copy("details.applicationName", "appName"),
    MappingRule::copy("details.packageName", "packageName"),
    MappingRule::copy("details.fileName", "fileName"),
    MappingRule::copy("details.activationStatus", "activationStatus"),
    MappingRule::copy("details.securityStatus", "securityStatus"),
    MappingRule::copy("details.protectionStatus", "protectionStatus"),
    MappingRule::copy("updatedDetails", "updatedDetails"),
];

/// MRA v2 事件 → LEEF 2.0 属性。
pub static MRA_V2_CATALOG: &[MappingRule] = &[
    MappingRule::copy("id", "externalId"),
    MappingRule::copy("created_time", "devTime"),
    MappingRule::copy("change_type", "changeType"),
    MappingRule::copy("enterprise_guid", "enterpriseGuid"),
    MappingRule::copy("entName", "entName"),
    MappingRule::copy("actor.type", "actorType"),
    MappingRule::copy("actor.guid", "actorGuid"),
    MappingRule::copy("target.type", "targetType"),
    MappingRule::copy("target.guid", "targetGuid"),
    MappingRule::copy("details.type", "detailsType"),
    MappingRule::copy("threat.guid", "threatGuid"),
    MappingRule::copy("threat.severity", "sev"),
    MappingRule::copy("threat.status", "threatStatus"),
    MappingRule::copy("threat.action", "threatAction"),
    MappingRule::copy("threat.assessment", "threatAssessment"),
    MappingRule::copy("threat.application_name", "appName"),
    MappingRule::copy("threat.package_name", "packageName"),
    MappingRule::copy("threat.file_name", "fileName"),
    MappingRule::copy("device.guid", "deviceGuid"),
    MappingRule::copy("device.email_address", "usrName"),
    MappingRule::copy("device.platform", "devicePlatform"),
    MappingRule::copy("device.os_version", "osVersion"),
    MappingRule::copy("device.manufacturer", "manufacturer"),
    MappingRule::copy("device.model", "model"),
    MappingRule::copy("device.status.activation_status", "activationStatus"),
    MappingRule::copy("device.status.security_status", "securityStatus"),
    MappingRule::copy("device.status.protection_status", "protectionStatus"),
    MappingRule::copy("audit.type", "auditType"),
    MappingRule::copy("audit.attribute_changes", "auditChanges"),
];
