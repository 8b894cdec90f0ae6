use crate::models::session::ActiveSession;
use crate::models::user::{Student, Teacher, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

// ---- auth ----

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub usn: String,
    pub name: String,
    pub email: String,
    pub is_teacher: bool,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<String>>,
}

impl UserProfile {
    pub fn new(user: &User, student: Option<&Student>, teacher: Option<&Teacher>) -> Self {
        Self {
            usn: user.usn.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            is_teacher: user.is_teacher,
            is_admin: user.is_admin,
            department: student.map(|s| s.department.clone()),
            year: student.map(|s| s.year),
            section: student.map(|s| s.section.clone()),
            subjects: teacher.map(|t| t.subjects.iter().cloned().collect()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

// ---- qr sessions ----

#[derive(Debug, Deserialize)]
pub struct GenerateSessionRequest {
    pub subject: String,
    /// Defaults to the caller; only admins may open on behalf of another teacher
    pub teacher_id: Option<String>,
    pub section: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateSessionResponse {
    pub message: String,
    pub session_id: String,
    pub subject: String,
    pub teacher_id: String,
    pub section: String,
    pub expires_at: DateTime<Utc>,
}

impl From<ActiveSession> for GenerateSessionResponse {
    fn from(session: ActiveSession) -> Self {
        Self {
            message: "QR session created".to_string(),
            session_id: session.session_id,
            subject: session.subject,
            teacher_id: session.teacher_id,
            section: session.section,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StopSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopSessionResponse {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifySessionResponse {
    pub valid: bool,
    pub subject: String,
    pub teacher_id: String,
    pub section: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ActiveSessionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Option<ActiveSession>> for ActiveSessionResponse {
    fn from(session: Option<ActiveSession>) -> Self {
        match session {
            Some(s) => Self {
                active: true,
                session_id: Some(s.session_id),
                subject: Some(s.subject),
                teacher_id: Some(s.teacher_id),
                section: Some(s.section),
                expires_at: Some(s.expires_at),
            },
            None => Self::default(),
        }
    }
}

// ---- attendance ----

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub session_id: String,
    /// Must match the caller when present
    pub student_id: Option<String>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub face_image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub success: bool,
    pub attendance_id: u64,
    pub session_id: String,
    pub qr: bool,
    pub location: bool,
    pub face: bool,
}

// ---- teacher override ----

#[derive(Debug, Deserialize)]
pub struct ManualMarkRequest {
    pub subject: String,
    #[serde(default)]
    pub usns: Vec<String>,
    pub classroom_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManualMarkResponse {
    pub success: bool,
    pub marked: Vec<String>,
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSummary {
    pub name: String,
    pub usn: String,
    pub email: String,
    pub section: String,
}

impl From<&Student> for StudentSummary {
    fn from(s: &Student) -> Self {
        Self {
            name: s.name.clone(),
            usn: s.usn.clone(),
            email: s.email.clone(),
            section: s.section.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionStudentsResponse {
    pub students: Vec<StudentSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeacherSubjectsResponse {
    pub teacher_id: String,
    pub subjects: Vec<String>,
}

// ---- face ----

#[derive(Debug, Deserialize)]
pub struct FaceVerifyRequest {
    pub image: String,
    /// Defaults to the caller
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaceVerifyResponse {
    pub verified: bool,
    pub message: String,
    pub confidence: Option<f64>,
}
