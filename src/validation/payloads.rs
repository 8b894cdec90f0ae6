use crate::core::error::ValidationError;
use crate::models::admin::{
    AddSlotRequest, AssignSectionRequest, ClassroomRequest, CreateStudentRequest,
    CreateTeacherRequest, FaceRegisterRequest, SetTimetableRequest,
};
use crate::models::payloads::{
    GenerateSessionRequest, LoginRequest, ManualMarkRequest, MarkAttendanceRequest,
    StopSessionRequest,
};
use crate::models::user::day_order;

const MAX_NAME: usize = 128;
const MAX_ID: usize = 64;
const MAX_MANUAL_BATCH: usize = 500;

/// Request bodies that can be checked before they touch a store.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn required(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

fn identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    required(field, value, MAX_ID)?;
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat(format!(
            "{} may only contain letters, digits, '-' and '_'",
            field
        )));
    }
    Ok(())
}

fn email(value: &str) -> Result<(), ValidationError> {
    required("email", value, 254)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidFormat("email".to_string())),
    }
}

fn password(value: &str) -> Result<(), ValidationError> {
    if value.len() < 8 {
        return Err(ValidationError::OutOfRange(
            "password must be at least 8 characters".to_string(),
        ));
    }
    if value.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }
    Ok(())
}

fn year(value: u32) -> Result<(), ValidationError> {
    if !(1..=6).contains(&value) {
        return Err(ValidationError::OutOfRange("year must be between 1 and 6".to_string()));
    }
    Ok(())
}

fn weekday(value: &str) -> Result<(), ValidationError> {
    if day_order(value) == day_order("") {
        return Err(ValidationError::InvalidFormat(format!("unknown day {:?}", value)));
    }
    Ok(())
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("email", &self.email, 254)?;
        required("password", &self.password, 128)
    }
}

impl Validate for GenerateSessionRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("subject", &self.subject, MAX_NAME)?;
        required("section", &self.section, MAX_ID)?;
        if let Some(teacher_id) = &self.teacher_id {
            required("teacher_id", teacher_id, MAX_ID)?;
        }
        Ok(())
    }
}

impl Validate for StopSessionRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("session_id", &self.session_id, MAX_ID)
    }
}

impl Validate for MarkAttendanceRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("session_id", &self.session_id, MAX_ID)
    }
}

impl Validate for ManualMarkRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("subject", &self.subject, MAX_NAME)?;
        if self.usns.is_empty() {
            return Err(ValidationError::MissingField("usns".to_string()));
        }
        if self.usns.len() > MAX_MANUAL_BATCH {
            return Err(ValidationError::OutOfRange(format!(
                "at most {} students per override",
                MAX_MANUAL_BATCH
            )));
        }
        Ok(())
    }
}

impl Validate for CreateStudentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        identifier("usn", &self.usn)?;
        required("name", &self.name, MAX_NAME)?;
        email(&self.email)?;
        password(&self.password)?;
        required("department", &self.department, MAX_ID)?;
        year(self.year)?;
        required("section", &self.section, MAX_ID)
    }
}

impl Validate for CreateTeacherRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        identifier("teacher_id", &self.teacher_id)?;
        required("name", &self.name, MAX_NAME)?;
        email(&self.email)?;
        password(&self.password)?;
        for subject in &self.subjects {
            required("subjects", subject, MAX_NAME)?;
        }
        Ok(())
    }
}

impl Validate for AssignSectionRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.usns.is_empty() {
            return Err(ValidationError::MissingField("usns".to_string()));
        }
        required("department", &self.department, MAX_ID)?;
        year(self.year)?;
        required("section", &self.section, MAX_ID)
    }
}

impl Validate for AddSlotRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("teacher_id", &self.teacher_id, MAX_ID)?;
        weekday(&self.day)?;
        required("time", &self.time, 32)?;
        required("subject", &self.subject, MAX_NAME)?;
        required("section", &self.section, MAX_ID)
    }
}

impl Validate for SetTimetableRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("teacher_id", &self.teacher_id, MAX_ID)?;
        for slot in &self.timetable.slots {
            weekday(&slot.day)?;
            required("time", &slot.time, 32)?;
            required("subject", &slot.subject, MAX_NAME)?;
            required("section", &slot.section, MAX_ID)?;
        }
        Ok(())
    }
}

impl Validate for ClassroomRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("room_number", &self.room_number, MAX_ID)?;
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::OutOfRange("lat must be within [-90, 90]".to_string()));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(ValidationError::OutOfRange("lon must be within [-180, 180]".to_string()));
        }
        Ok(())
    }
}

impl Validate for FaceRegisterRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        identifier("usn", &self.usn)?;
        required("image", &self.image, usize::MAX)
    }
}
