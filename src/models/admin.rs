use crate::models::attendance::AttendanceRecord;
use crate::models::user::{Teacher, Timetable, User};
use crate::stores::identity_store::SectionSlot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub usn: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub department: String,
    pub year: u32,
    pub section: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeacherRequest {
    pub teacher_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub qualification: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentListQuery {
    pub department: Option<String>,
    pub year: Option<u32>,
    pub section: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub message: String,
    pub usn: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeacherSummary {
    pub teacher_id: String,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub qualification: Option<String>,
    pub subjects: Vec<String>,
    pub timetable: Timetable,
}

impl TeacherSummary {
    pub fn new(teacher: Teacher, user: Option<&User>) -> Self {
        Self {
            name: user.map(|u| u.name.clone()).unwrap_or_default(),
            email: user.map(|u| u.email.clone()).unwrap_or_default(),
            teacher_id: teacher.teacher_id,
            phone_number: teacher.phone_number,
            qualification: teacher.qualification,
            subjects: teacher.subjects.into_iter().collect(),
            timetable: teacher.timetable,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignSectionRequest {
    pub usns: Vec<String>,
    pub department: String,
    pub year: u32,
    pub section: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignSectionResponse {
    pub success: bool,
    pub updated: usize,
}

#[derive(Debug, Deserialize)]
pub struct SetTimetableRequest {
    pub teacher_id: String,
    pub timetable: Timetable,
}

#[derive(Debug, Deserialize)]
pub struct AddSlotRequest {
    pub teacher_id: String,
    pub day: String,
    pub time: String,
    pub subject: String,
    pub section: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionTimetableResponse {
    pub section: String,
    pub slots: Vec<SectionSlot>,
}

#[derive(Debug, Deserialize)]
pub struct ClassroomRequest {
    pub room_number: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub image_paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FaceRegisterRequest {
    pub usn: String,
    /// Base64 or data URL
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaceRegisterResponse {
    pub success: bool,
    pub message: String,
    pub path: String,
}

/// Optional filters; blank or unparsable dates are ignored
#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    pub subject: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub count: usize,
    pub records: Vec<AttendanceRecord>,
}
