use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::validate_food_list;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "biological_sex", rename_all = "lowercase")]
pub enum BiologicalSex {
    #[default]
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "activity_level", rename_all = "snake_case")]
pub enum ActivityLevel {
    #[default]
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// Multiplier applied to the basal metabolic rate.
    pub fn factor(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NutritionGoal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_date: NaiveDate,
    pub height: i32,
    pub weight: i32,
    pub age: i32,
    pub sex: BiologicalSex,
    pub activity_level: ActivityLevel,
    pub breakfast: Json<Vec<String>>,
    pub morning_snack: Json<Vec<String>>,
    pub lunch: Json<Vec<String>>,
    pub evening_snack: Json<Vec<String>>,
    pub dinner: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NutritionGoalRequest {
    #[validate(range(min = 50, max = 300, message = "must be between 50 and 300 cm"))]
    pub height: i32,
    #[validate(range(min = 25, max = 1000, message = "must be between 25 and 1000 kg"))]
    pub weight: i32,
    #[validate(range(min = 1, max = 120, message = "must be between 1 and 120"))]
    pub age: i32,
    #[serde(default)]
    pub sex: BiologicalSex,
    #[serde(default)]
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub breakfast: Vec<String>,
    #[serde(default)]
    pub morning_snack: Vec<String>,
    #[serde(default)]
    pub lunch: Vec<String>,
    #[serde(default)]
    pub evening_snack: Vec<String>,
    #[serde(default)]
    pub dinner: Vec<String>,
}

impl NutritionGoalRequest {
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        validate_food_list("breakfast", &self.breakfast)?;
        validate_food_list("morning_snack", &self.morning_snack)?;
        validate_food_list("lunch", &self.lunch)?;
        validate_food_list("evening_snack", &self.evening_snack)?;
        validate_food_list("dinner", &self.dinner)
    }
}

#[derive(Debug, Serialize)]
pub struct NutritionGoalResponse {
    #[serde(flatten)]
    pub goal: NutritionGoal,
    pub bmi: f64,
    pub daily_calorie_target: i64,
}

impl From<NutritionGoal> for NutritionGoalResponse {
    fn from(goal: NutritionGoal) -> Self {
        let bmi = body_mass_index(goal.height, goal.weight);
        let daily_calorie_target =
            daily_calorie_target(goal.height, goal.weight, goal.age, goal.sex, goal.activity_level);
        Self {
            goal,
            bmi,
            daily_calorie_target,
        }
    }
}

/// BMI rounded to one decimal place.
pub fn body_mass_index(height_cm: i32, weight_kg: i32) -> f64 {
    let meters = f64::from(height_cm) / 100.0;
    if meters <= 0.0 {
        return 0.0;
    }
    let bmi = f64::from(weight_kg) / (meters * meters);
    (bmi * 10.0).round() / 10.0
}

/// Mifflin-St Jeor basal metabolic rate in kcal/day.
pub fn basal_metabolic_rate(height_cm: i32, weight_kg: i32, age: i32, sex: BiologicalSex) -> f64 {
    let base = 10.0 * f64::from(weight_kg) + 6.25 * f64::from(height_cm) - 5.0 * f64::from(age);
    match sex {
        BiologicalSex::Male => base + 5.0,
        BiologicalSex::Female => base - 161.0,
    }
}

pub fn daily_calorie_target(
    height_cm: i32,
    weight_kg: i32,
    age: i32,
    sex: BiologicalSex,
    activity: ActivityLevel,
) -> i64 {
    (basal_metabolic_rate(height_cm, weight_kg, age, sex) * activity.factor()).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bmi_is_rounded() {
        assert_eq!(body_mass_index(180, 81), 25.0);
        assert_eq!(body_mass_index(165, 60), 22.0);
        assert_eq!(body_mass_index(170, 65), 22.5);
    }

    #[test]
    fn mifflin_st_jeor() {
        // 10*70 + 6.25*175 - 5*30 = 1643.75
        assert_eq!(basal_metabolic_rate(175, 70, 30, BiologicalSex::Male), 1648.75);
        assert_eq!(basal_metabolic_rate(175, 70, 30, BiologicalSex::Female), 1482.75);
    }

    #[test]
    fn calorie_target_applies_activity_factor() {
        assert_eq!(
            daily_calorie_target(175, 70, 30, BiologicalSex::Female, ActivityLevel::Sedentary),
            1779
        );
        assert_eq!(
            daily_calorie_target(175, 70, 30, BiologicalSex::Male, ActivityLevel::Moderate),
            2556
        );
    }

    #[test]
    fn request_defaults_and_ranges() {
        let request: NutritionGoalRequest = serde_json::from_value(json!({
            "height": 170,
            "weight": 65,
            "age": 28,
            "lunch": ["rice", "lentils"]
        }))
        .unwrap();
        assert_eq!(request.sex, BiologicalSex::Male);
        assert_eq!(request.activity_level, ActivityLevel::Sedentary);
        assert!(request.check().is_ok());

        let too_short = NutritionGoalRequest {
            height: 40,
            ..request
        };
        assert!(too_short.check().is_err());
    }

    #[test]
    fn activity_level_names() {
        let level: ActivityLevel = serde_json::from_value(json!("very_active")).unwrap();
        assert_eq!(level, ActivityLevel::VeryActive);
    }
}
