use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity record. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    /// University serial number, unique across all users (teachers use their teacher id)
    pub usn: String,
    pub name: String,
    /// Unique, used for login
    pub email: String,
    /// Argon2id PHC string, never the plaintext password
    pub password_hash: String,
    pub is_teacher: bool,
    pub is_admin: bool,
}

/// Student profile owned 1:1 by the `User` with the same usn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: u64,
    pub user_id: u64,
    pub usn: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub year: u32,
    /// Cohort used as the sole eligibility predicate, reassignable by admins
    pub section: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: u64,
    pub user_id: u64,
    pub teacher_id: String,
    pub phone_number: Option<String>,
    pub qualification: Option<String>,
    pub subjects: BTreeSet<String>,
    pub timetable: Timetable,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    #[serde(default)]
    pub slots: Vec<TimetableSlot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableSlot {
    /// e.g. "Monday"
    pub day: String,
    /// e.g. "9:00-10:00"
    pub time: String,
    pub subject: String,
    pub section: String,
}

/// Weekday position used to order timetable views. Unknown days sort last.
pub fn day_order(day: &str) -> u8 {
    match day {
        "Monday" => 1,
        "Tuesday" => 2,
        "Wednesday" => 3,
        "Thursday" => 4,
        "Friday" => 5,
        "Saturday" => 6,
        "Sunday" => 7,
        _ => 99,
    }
}

/// Authenticated caller, resolved from a bearer token.
///
/// The section/department/year claims are captured at login; the marking
/// path always re-reads the student's current section from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub usn: String,
    pub email: String,
    pub is_teacher: bool,
    pub is_admin: bool,
    pub section: Option<String>,
    pub department: Option<String>,
    pub year: Option<u32>,
}

impl Principal {
    pub fn for_user(user: &User, student: Option<&Student>) -> Self {
        Self {
            usn: user.usn.clone(),
            email: user.email.clone(),
            is_teacher: user.is_teacher,
            is_admin: user.is_admin,
            section: student.map(|s| s.section.clone()),
            department: student.map(|s| s.department.clone()),
            year: student.map(|s| s.year),
        }
    }

    /// Teachers and admins may run sessions and overrides
    pub fn can_teach(&self) -> bool {
        self.is_teacher || self.is_admin
    }

    pub fn is_student(&self) -> bool {
        !self.is_teacher && !self.is_admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_teacher: bool, is_admin: bool) -> User {
        User {
            id: 1,
            usn: "1XX21CS001".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.edu".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            is_teacher,
            is_admin,
        }
    }

    #[test]
    fn test_principal_roles() {
        let student = Principal::for_user(&user(false, false), None);
        assert!(student.is_student());
        assert!(!student.can_teach());

        let teacher = Principal::for_user(&user(true, false), None);
        assert!(teacher.can_teach());
        assert!(!teacher.is_student());

        let admin = Principal::for_user(&user(false, true), None);
        assert!(admin.can_teach());
        assert!(!admin.is_student());
    }

    #[test]
    fn test_principal_captures_student_claims() {
        let u = user(false, false);
        let s = Student {
            id: 7,
            user_id: 1,
            usn: u.usn.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            department: "CSE".to_string(),
            year: 3,
            section: "CSE-3A".to_string(),
        };

        let principal = Principal::for_user(&u, Some(&s));
        assert_eq!(principal.section.as_deref(), Some("CSE-3A"));
        assert_eq!(principal.department.as_deref(), Some("CSE"));
        assert_eq!(principal.year, Some(3));
    }

    #[test]
    fn test_day_order() {
        assert!(day_order("Monday") < day_order("Friday"));
        assert_eq!(day_order("Funday"), 99);
    }
}
