use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Unmarked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub institution_id: String,
    pub name: String,
    pub teacher_ids: Vec<String>,
}

/// One dated, timed session of a course (or a non-attendance free period).
/// `subject` is a denormalized copy of the course name, captured at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledClass {
    pub id: String,
    pub institution_id: String,
    pub course_id: String,
    pub subject: String,
    /// `"HH:MM - HH:MM"`, campus wall clock.
    pub time: String,
    pub date: NaiveDate,
    pub is_free_period: bool,
    pub is_locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub institution_id: String,
    pub name: String,
    pub avatar_url: String,
    pub roll_no: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub course_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub institution_id: String,
    pub name: String,
    pub avatar_url: String,
    pub employee_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub institution_id: String,
    pub user_id: String,
    pub user_type: UserRole,
    pub scheduled_class_id: String,
    pub status: AttendanceStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("class is locked and attendance cannot be changed")]
    ClassLocked,
    #[error("class not found")]
    ClassNotFound,
    #[error("student not found")]
    StudentNotFound,
    #[error("another account in this institution already uses this {field}")]
    DuplicateIdentifier { field: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub user_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct MarkOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Entries ignored because the user is not on the tenant roster, or the
    /// stored status already matched.
    pub skipped: usize,
}

/// Tenant-scoped projection. Read-only; cloning keeps the caller decoupled
/// from later mutations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantView {
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
    pub courses: Vec<Course>,
    pub classes: Vec<ScheduledClass>,
    pub records: Vec<AttendanceRecord>,
}

/// The authoritative collection of classes and attendance records for all
/// tenants. The store swaps the whole value after each saved mutation, so
/// readers never observe a partial update.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    #[serde(default)]
    pub institutions: Vec<Institution>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub scheduled_classes: Vec<ScheduledClass>,
    #[serde(default)]
    pub attendance_records: Vec<AttendanceRecord>,
}

impl LedgerState {
    pub fn tenant_view(&self, institution_id: &str) -> TenantView {
        TenantView {
            students: self
                .students
                .iter()
                .filter(|s| s.institution_id == institution_id)
                .cloned()
                .collect(),
            teachers: self
                .teachers
                .iter()
                .filter(|t| t.institution_id == institution_id)
                .cloned()
                .collect(),
            courses: self
                .courses
                .iter()
                .filter(|c| c.institution_id == institution_id)
                .cloned()
                .collect(),
            classes: self
                .scheduled_classes
                .iter()
                .filter(|c| c.institution_id == institution_id)
                .cloned()
                .collect(),
            records: self
                .attendance_records
                .iter()
                .filter(|r| r.institution_id == institution_id)
                .cloned()
                .collect(),
        }
    }

    pub fn class(&self, institution_id: &str, class_id: &str) -> Option<&ScheduledClass> {
        self.scheduled_classes
            .iter()
            .find(|c| c.institution_id == institution_id && c.id == class_id)
    }

    pub fn add_class(
        &mut self,
        institution_id: &str,
        course_id: &str,
        subject: &str,
        date: NaiveDate,
        time: &str,
    ) -> ScheduledClass {
        let class = ScheduledClass {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            course_id: course_id.to_string(),
            subject: subject.to_string(),
            time: time.to_string(),
            date,
            is_free_period: false,
            is_locked: false,
        };
        self.scheduled_classes.push(class.clone());
        // Stable sort: same-slot classes keep insertion order.
        self.scheduled_classes
            .sort_by_key(|c| (c.date, clock::start_of(&c.time)));
        class
    }

    /// Removes the class and every record referencing it. No-op for an
    /// unknown or foreign-tenant id.
    pub fn remove_class(&mut self, institution_id: &str, class_id: &str) {
        if self.class(institution_id, class_id).is_none() {
            return;
        }
        self.scheduled_classes.retain(|c| c.id != class_id);
        self.attendance_records
            .retain(|r| r.scheduled_class_id != class_id);
    }

    pub fn mark_attendance(
        &mut self,
        institution_id: &str,
        class_id: &str,
        entries: &[MarkEntry],
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, LedgerError> {
        let class = self
            .class(institution_id, class_id)
            .ok_or(LedgerError::ClassNotFound)?;
        if class.is_locked {
            return Err(LedgerError::ClassLocked);
        }
        if class.is_free_period {
            // Free periods never carry records; treat every entry as skipped.
            return Ok(MarkOutcome {
                skipped: entries.len(),
                ..MarkOutcome::default()
            });
        }

        let mut outcome = MarkOutcome::default();
        for entry in entries {
            let Some(user_type) = self.roster_role(institution_id, &entry.user_id) else {
                outcome.skipped += 1;
                continue;
            };
            match self
                .attendance_records
                .iter_mut()
                .find(|r| r.scheduled_class_id == class_id && r.user_id == entry.user_id)
            {
                Some(existing) => {
                    if existing.status != entry.status {
                        // Update in place; the original timestamp is kept.
                        existing.status = entry.status;
                        outcome.updated += 1;
                    } else {
                        outcome.skipped += 1;
                    }
                }
                None => {
                    self.attendance_records.push(AttendanceRecord {
                        id: Uuid::new_v4().to_string(),
                        institution_id: institution_id.to_string(),
                        user_id: entry.user_id.clone(),
                        user_type,
                        scheduled_class_id: class_id.to_string(),
                        status: entry.status,
                        timestamp: now,
                    });
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Unlocked -> Locked. Every enrolled student without a record is filled
    /// in as Absent (free periods excepted). Returns the fill count; locking
    /// an already-locked class is a no-op returning 0.
    pub fn lock_class(
        &mut self,
        institution_id: &str,
        class_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        let class = self
            .scheduled_classes
            .iter_mut()
            .find(|c| c.institution_id == institution_id && c.id == class_id)
            .ok_or(LedgerError::ClassNotFound)?;
        if class.is_locked {
            return Ok(0);
        }
        class.is_locked = true;
        let class = class.clone();
        if class.is_free_period {
            return Ok(0);
        }
        Ok(self.fill_absent(&class, now))
    }

    pub fn unlock_class(
        &mut self,
        institution_id: &str,
        class_id: &str,
    ) -> Result<(), LedgerError> {
        let class = self
            .scheduled_classes
            .iter_mut()
            .find(|c| c.institution_id == institution_id && c.id == class_id)
            .ok_or(LedgerError::ClassNotFound)?;
        class.is_locked = false;
        Ok(())
    }

    /// Locks every unlocked class of the institution scheduled today (campus
    /// calendar) whose end time has passed, with the same absent-fill as an
    /// explicit lock. Safe to re-run with the same clock value.
    pub fn auto_lock_expired(&mut self, institution_id: &str, now: DateTime<Utc>) -> Vec<String> {
        let campus = clock::to_campus(now);
        let expired: Vec<String> = self
            .scheduled_classes
            .iter()
            .filter(|c| {
                c.institution_id == institution_id && !c.is_locked && c.date == campus.date()
            })
            .filter(|c| match clock::TimeRange::parse(&c.time) {
                Some(range) => campus.time() > range.end,
                None => false,
            })
            .map(|c| c.id.clone())
            .collect();
        for class_id in &expired {
            // The class was found unlocked just above; the transition itself
            // cannot fail here.
            let _ = self.lock_class(institution_id, class_id, now);
        }
        expired
    }

    fn fill_absent(&mut self, class: &ScheduledClass, now: DateTime<Utc>) -> usize {
        let enrolled: Vec<String> = self
            .students
            .iter()
            .filter(|s| {
                s.institution_id == class.institution_id
                    && s.course_ids.iter().any(|c| c == &class.course_id)
            })
            .map(|s| s.id.clone())
            .collect();
        let mut filled = 0;
        for student_id in enrolled {
            let already = self
                .attendance_records
                .iter()
                .any(|r| r.scheduled_class_id == class.id && r.user_id == student_id);
            if already {
                continue;
            }
            self.attendance_records.push(AttendanceRecord {
                id: Uuid::new_v4().to_string(),
                institution_id: class.institution_id.clone(),
                user_id: student_id,
                user_type: UserRole::Student,
                scheduled_class_id: class.id.clone(),
                status: AttendanceStatus::Absent,
                timestamp: now,
            });
            filled += 1;
        }
        filled
    }

    fn roster_role(&self, institution_id: &str, user_id: &str) -> Option<UserRole> {
        if self
            .students
            .iter()
            .any(|s| s.institution_id == institution_id && s.id == user_id)
        {
            return Some(UserRole::Student);
        }
        if self
            .teachers
            .iter()
            .any(|t| t.institution_id == institution_id && t.id == user_id)
        {
            return Some(UserRole::Teacher);
        }
        None
    }

    /// Students of the institution enrolled in the class's course, in roster
    /// order.
    pub fn enrolled_students(&self, class: &ScheduledClass) -> Vec<&Student> {
        self.students
            .iter()
            .filter(|s| {
                s.institution_id == class.institution_id
                    && s.course_ids.iter().any(|c| c == &class.course_id)
            })
            .collect()
    }

    pub fn register_student(
        &mut self,
        institution_id: &str,
        name: &str,
        email: &str,
        roll_no: &str,
        avatar_url: Option<&str>,
    ) -> Result<Student, LedgerError> {
        if let Some(field) = self.duplicate_student_field(institution_id, None, email, roll_no) {
            return Err(LedgerError::DuplicateIdentifier { field });
        }
        let student = Student {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name: name.to_string(),
            avatar_url: avatar_url
                .map(str::to_string)
                .unwrap_or_else(|| default_avatar(email)),
            roll_no: roll_no.to_string(),
            email: email.to_string(),
            phone: None,
            course_ids: Vec::new(),
        };
        self.students.push(student.clone());
        Ok(student)
    }

    pub fn update_student(
        &mut self,
        institution_id: &str,
        student_id: &str,
        name: &str,
        email: &str,
        roll_no: &str,
    ) -> Result<Student, LedgerError> {
        if let Some(field) =
            self.duplicate_student_field(institution_id, Some(student_id), email, roll_no)
        {
            return Err(LedgerError::DuplicateIdentifier { field });
        }
        let student = self
            .students
            .iter_mut()
            .find(|s| s.institution_id == institution_id && s.id == student_id)
            .ok_or(LedgerError::StudentNotFound)?;
        student.name = name.to_string();
        student.email = email.to_string();
        student.roll_no = roll_no.to_string();
        Ok(student.clone())
    }

    pub fn update_student_photo(
        &mut self,
        institution_id: &str,
        student_id: &str,
        avatar_url: &str,
    ) -> Result<(), LedgerError> {
        let student = self
            .students
            .iter_mut()
            .find(|s| s.institution_id == institution_id && s.id == student_id)
            .ok_or(LedgerError::StudentNotFound)?;
        student.avatar_url = avatar_url.to_string();
        Ok(())
    }

    pub fn sign_up_student(
        &mut self,
        institution_id: &str,
        name: &str,
        email: &str,
        roll_no: &str,
    ) -> Result<Student, LedgerError> {
        // Sign-up only guards the email; the roll number is checked when the
        // teacher registers the student on a roster.
        if self
            .students
            .iter()
            .any(|s| s.institution_id == institution_id && s.email.eq_ignore_ascii_case(email))
        {
            return Err(LedgerError::DuplicateIdentifier { field: "email" });
        }
        let student = Student {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name: name.to_string(),
            avatar_url: default_avatar(email),
            roll_no: roll_no.to_string(),
            email: email.to_string(),
            phone: None,
            course_ids: Vec::new(),
        };
        self.students.push(student.clone());
        Ok(student)
    }

    pub fn sign_up_teacher(
        &mut self,
        institution_id: &str,
        name: &str,
        email: &str,
        employee_id: &str,
    ) -> Result<Teacher, LedgerError> {
        if self
            .teachers
            .iter()
            .any(|t| t.institution_id == institution_id && t.email.eq_ignore_ascii_case(email))
        {
            return Err(LedgerError::DuplicateIdentifier { field: "email" });
        }
        let teacher = Teacher {
            id: Uuid::new_v4().to_string(),
            institution_id: institution_id.to_string(),
            name: name.to_string(),
            avatar_url: default_avatar(email),
            employee_id: employee_id.to_string(),
            email: email.to_string(),
            phone: None,
        };
        self.teachers.push(teacher.clone());
        Ok(teacher)
    }

    pub fn find_student_by_email(&self, institution_id: &str, email: &str) -> Option<&Student> {
        self.students
            .iter()
            .find(|s| s.institution_id == institution_id && s.email.eq_ignore_ascii_case(email))
    }

    pub fn find_teacher_by_email(&self, institution_id: &str, email: &str) -> Option<&Teacher> {
        self.teachers
            .iter()
            .find(|t| t.institution_id == institution_id && t.email.eq_ignore_ascii_case(email))
    }

    fn duplicate_student_field(
        &self,
        institution_id: &str,
        exclude_id: Option<&str>,
        email: &str,
        roll_no: &str,
    ) -> Option<&'static str> {
        for s in &self.students {
            if s.institution_id != institution_id || Some(s.id.as_str()) == exclude_id {
                continue;
            }
            if s.email.eq_ignore_ascii_case(email) {
                return Some("email");
            }
            if s.roll_no.eq_ignore_ascii_case(roll_no) {
                return Some("roll number");
            }
        }
        None
    }
}

fn default_avatar(seed: &str) -> String {
    format!("https://picsum.photos/seed/{}/100/100", seed)
}
