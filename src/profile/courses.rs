/// A course checkbox on the profile form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Course {
    pub field: &'static str,
    pub label: &'static str,
}

/// Course checkboxes in display order. The stored `courses` value follows
/// this order.
pub const COURSES: &[Course] = &[
    Course { field: "course_excel", label: "Excel Impressionador" },
    Course { field: "course_vba", label: "VBA Impressionador" },
    Course { field: "course_powerbi", label: "Power BI Impressionador" },
    Course { field: "course_python", label: "Python Impressionador" },
    Course { field: "course_ppt", label: "Apresentações Impressionadoras" },
    Course { field: "course_sql", label: "SQL Impressionador" },
];

/// Labels of the checked courses, in list order, joined with `;`.
pub fn join_checked(courses: &[Course], is_checked: impl Fn(&Course) -> bool) -> String {
    courses
        .iter()
        .filter(|c| is_checked(*c))
        .map(|c| c.label)
        .collect::<Vec<_>>()
        .join(";")
}

pub fn find_by_field(field: &str) -> Option<&'static Course> {
    COURSES.iter().find(|c| c.field == field)
}
