use crate::core::error::AttendanceError;
use crate::models::classroom::Classroom;
use crate::models::user::{day_order, Student, Teacher, Timetable, TimetableSlot, User};
use crate::wal::wal::{Journal, WalOperation};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Input for a new student account
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub usn: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub department: String,
    pub year: u32,
    pub section: String,
}

/// Input for a new teacher account
#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub teacher_id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub qualification: Option<String>,
    pub subjects: Vec<String>,
}

/// Filters for listing students; `None` matches everything
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub department: Option<String>,
    pub year: Option<u32>,
    pub section: Option<String>,
}

/// A timetable slot flattened with its owning teacher
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SectionSlot {
    pub day: String,
    pub time: String,
    pub subject: String,
    pub section: String,
    pub teacher_id: String,
}

/// Users, students, teachers and classrooms.
///
/// Reads are lock-free through the maps. Writes are serialized through
/// `writes` so uniqueness checks, the journal append and the in-memory
/// apply happen as one step.
pub struct IdentityStore {
    users: DashMap<String, Arc<User>>,
    emails: DashMap<String, String>,
    students: DashMap<String, Student>,
    teachers: DashMap<String, Teacher>,
    classrooms: DashMap<String, Classroom>,
    next_id: AtomicU64,
    writes: Mutex<()>,
    journal: Arc<dyn Journal>,
}

impl IdentityStore {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            students: DashMap::new(),
            teachers: DashMap::new(),
            classrooms: DashMap::new(),
            next_id: AtomicU64::new(1),
            writes: Mutex::new(()),
            journal,
        }
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The `offset`-th id after the last one applied. Nothing is consumed:
    /// the counter only moves when the write is applied after a successful
    /// journal append. Callers hold the write lock.
    fn pending_id(&self, offset: u64) -> u64 {
        self.next_id.load(Ordering::Relaxed) + offset
    }

    /// Keep the id counter ahead of anything restored from the log
    fn observe_id(&self, id: u64) {
        self.next_id.fetch_max(id + 1, Ordering::Relaxed);
    }

    fn log(&self, op: &WalOperation) -> Result<(), AttendanceError> {
        self.journal
            .append(op)
            .map_err(|e| AttendanceError::Storage(e.to_string()))
    }

    fn ensure_unique(&self, usn: &str, email: &str) -> Result<(), AttendanceError> {
        if self.users.contains_key(usn) || self.emails.contains_key(email) {
            warn!(usn = %usn, email = %email, "Duplicate user rejected");
            return Err(AttendanceError::Conflict(
                "User with this USN or email already exists".to_string(),
            ));
        }
        Ok(())
    }

    fn insert_user(&self, user: User) -> Arc<User> {
        self.observe_id(user.id);
        let user = Arc::new(user);
        self.emails.insert(user.email.clone(), user.usn.clone());
        self.users.insert(user.usn.clone(), Arc::clone(&user));
        user
    }

    /// Create a bare user (used for administrators).
    pub fn create_user(
        &self,
        usn: &str,
        name: &str,
        email: &str,
        password_hash: String,
        is_teacher: bool,
        is_admin: bool,
    ) -> Result<Arc<User>, AttendanceError> {
        let _guard = self.write_lock();
        self.ensure_unique(usn, email)?;

        let user = User {
            id: self.pending_id(0),
            usn: usn.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            is_teacher,
            is_admin,
        };

        self.log(&WalOperation::CreateUser { user: user.clone() })?;
        let user = self.insert_user(user);

        info!(usn = %user.usn, is_admin = user.is_admin, "User created");
        Ok(user)
    }

    /// Create a user and its student profile together.
    pub fn create_student(&self, new: NewStudent) -> Result<Student, AttendanceError> {
        let _guard = self.write_lock();
        self.ensure_unique(&new.usn, &new.email)?;

        let user = User {
            id: self.pending_id(0),
            usn: new.usn.clone(),
            name: new.name.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash,
            is_teacher: false,
            is_admin: false,
        };
        let student = Student {
            id: self.pending_id(1),
            user_id: user.id,
            usn: new.usn,
            name: new.name,
            email: new.email,
            department: new.department,
            year: new.year,
            section: new.section,
        };

        self.log(&WalOperation::CreateStudent {
            user: user.clone(),
            student: student.clone(),
        })?;
        self.restore_student(user, student.clone());

        info!(usn = %student.usn, section = %student.section, "Student created");
        Ok(student)
    }

    /// Create a user and its teacher profile together.
    pub fn create_teacher(&self, new: NewTeacher) -> Result<Teacher, AttendanceError> {
        let _guard = self.write_lock();
        self.ensure_unique(&new.teacher_id, &new.email)?;

        let user = User {
            id: self.pending_id(0),
            usn: new.teacher_id.clone(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            is_teacher: true,
            is_admin: false,
        };
        let teacher = Teacher {
            id: self.pending_id(1),
            user_id: user.id,
            teacher_id: new.teacher_id,
            phone_number: new.phone_number,
            qualification: new.qualification,
            subjects: new.subjects.into_iter().collect(),
            timetable: Timetable::default(),
        };

        self.log(&WalOperation::CreateTeacher {
            user: user.clone(),
            teacher: teacher.clone(),
        })?;
        self.restore_teacher(user, teacher.clone());

        info!(teacher_id = %teacher.teacher_id, "Teacher created");
        Ok(teacher)
    }

    /// Bulk reassignment. Unknown usns are ignored; returns how many changed.
    pub fn assign_section(
        &self,
        usns: &[String],
        department: &str,
        year: u32,
        section: &str,
    ) -> Result<usize, AttendanceError> {
        let _guard = self.write_lock();

        let known: Vec<String> = usns
            .iter()
            .filter(|usn| self.students.contains_key(usn.as_str()))
            .cloned()
            .collect();

        if known.is_empty() {
            return Ok(0);
        }

        self.log(&WalOperation::AssignSection {
            usns: known.clone(),
            department: department.to_string(),
            year,
            section: section.to_string(),
        })?;
        let updated = self.apply_assign_section(&known, department, year, section);

        info!(updated = updated, section = %section, "Sections reassigned");
        Ok(updated)
    }

    fn apply_assign_section(
        &self,
        usns: &[String],
        department: &str,
        year: u32,
        section: &str,
    ) -> usize {
        let mut updated = 0;
        for usn in usns {
            if let Some(mut student) = self.students.get_mut(usn) {
                student.department = department.to_string();
                student.year = year;
                student.section = section.to_string();
                updated += 1;
            }
        }
        updated
    }

    pub fn set_timetable(
        &self,
        teacher_id: &str,
        timetable: Timetable,
    ) -> Result<(), AttendanceError> {
        let _guard = self.write_lock();
        if !self.teachers.contains_key(teacher_id) {
            return Err(AttendanceError::NotFound(format!("Teacher {}", teacher_id)));
        }

        self.log(&WalOperation::SetTimetable {
            teacher_id: teacher_id.to_string(),
            timetable: timetable.clone(),
        })?;
        if let Some(mut teacher) = self.teachers.get_mut(teacher_id) {
            teacher.timetable = timetable;
        }

        info!(teacher_id = %teacher_id, "Timetable replaced");
        Ok(())
    }

    pub fn add_timetable_slot(
        &self,
        teacher_id: &str,
        slot: TimetableSlot,
    ) -> Result<(), AttendanceError> {
        let _guard = self.write_lock();
        if !self.teachers.contains_key(teacher_id) {
            return Err(AttendanceError::NotFound(format!("Teacher {}", teacher_id)));
        }

        self.log(&WalOperation::AddTimetableSlot {
            teacher_id: teacher_id.to_string(),
            slot: slot.clone(),
        })?;
        if let Some(mut teacher) = self.teachers.get_mut(teacher_id) {
            teacher.timetable.slots.push(slot);
        }
        Ok(())
    }

    /// Insert or update a classroom keyed by room number.
    pub fn save_classroom(
        &self,
        room_number: &str,
        lat: f64,
        lon: f64,
        image_paths: Vec<String>,
    ) -> Result<Classroom, AttendanceError> {
        let _guard = self.write_lock();

        let id = match self.classrooms.get(room_number) {
            Some(existing) => existing.id,
            None => self.pending_id(0),
        };
        let classroom = Classroom {
            id,
            room_number: room_number.to_string(),
            lat,
            lon,
            image_paths,
        };

        self.log(&WalOperation::SaveClassroom {
            classroom: classroom.clone(),
        })?;
        self.restore_classroom(classroom.clone());
        Ok(classroom)
    }

    pub fn get_user(&self, usn: &str) -> Option<Arc<User>> {
        self.users.get(usn).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<Arc<User>> {
        let usn = self.emails.get(email)?.value().clone();
        self.get_user(&usn)
    }

    pub fn get_student(&self, usn: &str) -> Option<Student> {
        self.students.get(usn).map(|entry| entry.value().clone())
    }

    pub fn get_teacher(&self, teacher_id: &str) -> Option<Teacher> {
        self.teachers.get(teacher_id).map(|entry| entry.value().clone())
    }

    pub fn get_classroom(&self, room_number: &str) -> Option<Classroom> {
        self.classrooms.get(room_number).map(|entry| entry.value().clone())
    }

    /// Students matching every provided filter, ordered by usn
    pub fn list_students(&self, filter: &StudentFilter) -> Vec<Student> {
        let mut students: Vec<Student> = self
            .students
            .iter()
            .filter(|entry| {
                let s = entry.value();
                filter.department.as_ref().map_or(true, |d| &s.department == d)
                    && filter.year.map_or(true, |y| s.year == y)
                    && filter.section.as_ref().map_or(true, |sec| &s.section == sec)
            })
            .map(|entry| entry.value().clone())
            .collect();
        students.sort_by(|a, b| a.usn.cmp(&b.usn));
        students
    }

    /// Current headcount of a section. Evaluated at call time.
    pub fn count_in_section(&self, section: &str) -> usize {
        self.students
            .iter()
            .filter(|entry| entry.value().section == section)
            .count()
    }

    pub fn list_teachers(&self) -> Vec<(Teacher, Option<Arc<User>>)> {
        let mut teachers: Vec<(Teacher, Option<Arc<User>>)> = self
            .teachers
            .iter()
            .map(|entry| {
                let teacher = entry.value().clone();
                let user = self.get_user(&teacher.teacher_id);
                (teacher, user)
            })
            .collect();
        teachers.sort_by(|a, b| a.0.teacher_id.cmp(&b.0.teacher_id));
        teachers
    }

    /// Every slot taught to `section`, ordered by weekday then time
    pub fn section_timetable(&self, section: &str) -> Vec<SectionSlot> {
        let mut slots: Vec<SectionSlot> = self
            .teachers
            .iter()
            .flat_map(|entry| {
                let teacher_id = entry.value().teacher_id.clone();
                entry
                    .value()
                    .timetable
                    .slots
                    .iter()
                    .filter(|slot| slot.section == section)
                    .map(|slot| SectionSlot {
                        day: slot.day.clone(),
                        time: slot.time.clone(),
                        subject: slot.subject.clone(),
                        section: slot.section.clone(),
                        teacher_id: teacher_id.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        slots.sort_by(|a, b| {
            (day_order(&a.day), a.time.as_str(), a.teacher_id.as_str()).cmp(&(
                day_order(&b.day),
                b.time.as_str(),
                b.teacher_id.as_str(),
            ))
        });
        slots
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn teacher_count(&self) -> usize {
        self.teachers.len()
    }

    // Replay paths below apply logged operations without journaling them again.

    pub fn restore_user(&self, user: User) {
        self.insert_user(user);
    }

    pub fn restore_student(&self, user: User, student: Student) {
        self.insert_user(user);
        self.observe_id(student.id);
        self.students.insert(student.usn.clone(), student);
    }

    pub fn restore_teacher(&self, user: User, teacher: Teacher) {
        self.insert_user(user);
        self.observe_id(teacher.id);
        self.teachers.insert(teacher.teacher_id.clone(), teacher);
    }

    pub fn restore_assign_section(
        &self,
        usns: &[String],
        department: &str,
        year: u32,
        section: &str,
    ) {
        self.apply_assign_section(usns, department, year, section);
    }

    pub fn restore_timetable(&self, teacher_id: &str, timetable: Timetable) {
        if let Some(mut teacher) = self.teachers.get_mut(teacher_id) {
            teacher.timetable = timetable;
        }
    }

    pub fn restore_timetable_slot(&self, teacher_id: &str, slot: TimetableSlot) {
        if let Some(mut teacher) = self.teachers.get_mut(teacher_id) {
            teacher.timetable.slots.push(slot);
        }
    }

    pub fn restore_classroom(&self, classroom: Classroom) {
        self.observe_id(classroom.id);
        self.classrooms
            .insert(classroom.room_number.clone(), classroom);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn new_student(usn: &str, name: &str, section: &str) -> NewStudent {
        NewStudent {
            usn: usn.to_string(),
            name: name.to_string(),
            email: format!("{}@example.edu", usn.to_lowercase()),
            password_hash: "$argon2id$stub".to_string(),
            department: "CSE".to_string(),
            year: 3,
            section: section.to_string(),
        }
    }

    pub fn new_teacher(teacher_id: &str, subjects: &[&str]) -> NewTeacher {
        NewTeacher {
            teacher_id: teacher_id.to_string(),
            name: format!("Teacher {}", teacher_id),
            email: format!("{}@example.edu", teacher_id.to_lowercase()),
            password_hash: "$argon2id$stub".to_string(),
            phone_number: None,
            qualification: Some("M.Tech".to_string()),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
        }
    }
}
